// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Quantization tables and the per-block transform stage.

use octopus_transforms::{BLOCK_SIZE, fdct8x8_shifted, idct8x8_shifted};

use crate::{
    bit_reader::ByteReader,
    bit_writer::ByteWriter,
    coeffs::{CoeffBlock, ZIGZAG},
    error::{Error, Result},
};

/// Number of quantization table destinations.
pub const NUM_QUANT_TABLES: usize = 4;

/// Annex K.1, Table K.1.
#[rustfmt::skip]
const LUMINANCE: [u16; BLOCK_SIZE] = [
    16, 11, 10, 16,  24,  40,  51,  61,
    12, 12, 14, 19,  26,  58,  60,  55,
    14, 13, 16, 24,  40,  57,  69,  56,
    14, 17, 22, 29,  51,  87,  80,  62,
    18, 22, 37, 56,  68, 109, 103,  77,
    24, 35, 55, 64,  81, 104, 113,  92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103,  99,
];

/// Annex K.1, Table K.2.
#[rustfmt::skip]
const CHROMINANCE: [u16; BLOCK_SIZE] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Maps an encoder quality in 1..=100 to the percentage applied to the reference tables.
pub fn quality_to_scale_factor(quality: u32) -> u32 {
    let quality = quality.clamp(1, 100);
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

/// A quantization table with entries in natural order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    /// `Pq`: 0 for 8-bit entries, 1 for 16-bit entries.
    pub precision: u8,
    pub values: [u16; BLOCK_SIZE],
}

impl QuantTable {
    fn scaled(reference: &[u16; BLOCK_SIZE], quality: u32) -> QuantTable {
        let sf = quality_to_scale_factor(quality);
        QuantTable {
            precision: 0,
            values: array_init::array_init(|i| {
                ((reference[i] as u32 * sf + 50) / 100).clamp(1, 255) as u16
            }),
        }
    }

    pub fn luminance(quality: u32) -> QuantTable {
        Self::scaled(&LUMINANCE, quality)
    }

    pub fn chrominance(quality: u32) -> QuantTable {
        Self::scaled(&CHROMINANCE, quality)
    }

    /// Reads one table definition of a DQT segment, returning its destination.
    pub fn read(br: &mut ByteReader) -> Result<(u8, QuantTable)> {
        let (precision, dest) = br.read_nibbles()?;
        if precision > 1 {
            return Err(Error::InvalidQuantPrecision(precision));
        }
        if dest as usize >= NUM_QUANT_TABLES {
            return Err(Error::InvalidQuantTableIndex(dest));
        }
        let mut values = [0u16; BLOCK_SIZE];
        for &pos in &ZIGZAG {
            values[pos] = if precision == 0 {
                br.read_u8()? as u16
            } else {
                br.read_u16()?
            };
        }
        Ok((dest, QuantTable { precision, values }))
    }

    /// Size of the definition written by [`QuantTable::write`].
    pub fn encoded_len(&self) -> usize {
        1 + BLOCK_SIZE * (self.precision as usize + 1)
    }

    pub fn write(&self, w: &mut ByteWriter, dest: u8) -> Result<()> {
        w.write_nibbles(self.precision, dest)?;
        for &pos in &ZIGZAG {
            if self.precision == 0 {
                w.write_u8(self.values[pos] as u8)?;
            } else {
                w.write_u16(self.values[pos])?;
            }
        }
        Ok(())
    }

    pub fn dequantize(&self, coeffs: &CoeffBlock, out: &mut [f32; BLOCK_SIZE]) {
        for ((o, &c), &q) in out.iter_mut().zip(coeffs).zip(&self.values) {
            *o = (c * q as i32) as f32;
        }
    }

    /// Divides by the table entries, rounding to nearest.
    pub fn quantize(&self, dct: &[f32; BLOCK_SIZE], out: &mut CoeffBlock) {
        for ((o, &d), &q) in out.iter_mut().zip(dct).zip(&self.values) {
            *o = (d / q as f32).round() as i32;
        }
    }

    /// Dequantizes and inverse transforms a block back to samples.
    pub fn reconstruct(&self, coeffs: &CoeffBlock, level_shift: f32) -> [f32; BLOCK_SIZE] {
        let mut samples = [0.0; BLOCK_SIZE];
        self.dequantize(coeffs, &mut samples);
        idct8x8_shifted(&mut samples, level_shift);
        samples
    }

    /// Forward transforms and quantizes a block of samples.
    pub fn compress(&self, samples: &[f32; BLOCK_SIZE], level_shift: f32) -> CoeffBlock {
        let mut dct = *samples;
        fdct8x8_shifted(&mut dct, level_shift);
        let mut coeffs = [0; BLOCK_SIZE];
        self.quantize(&dct, &mut coeffs);
        coeffs
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::util::test::assert_almost_eq;

    #[test]
    fn scale_factors() {
        assert_eq!(quality_to_scale_factor(0), 5000);
        assert_eq!(quality_to_scale_factor(1), 5000);
        assert_eq!(quality_to_scale_factor(25), 200);
        assert_eq!(quality_to_scale_factor(50), 100);
        assert_eq!(quality_to_scale_factor(75), 50);
        assert_eq!(quality_to_scale_factor(100), 0);
        assert_eq!(quality_to_scale_factor(250), 0);
    }

    #[test]
    fn scaled_tables() {
        assert_eq!(QuantTable::luminance(50).values, LUMINANCE);
        let q75 = QuantTable::luminance(75);
        assert_eq!(q75.values[0], 8);
        assert_eq!(q75.values[1], 6);
        assert!(QuantTable::chrominance(100).values.iter().all(|&v| v == 1));
        assert!(QuantTable::luminance(1).values.iter().all(|&v| v == 255));
    }

    #[test]
    fn dqt_round_trip() -> Result<()> {
        for precision in 0..2 {
            let mut table = QuantTable::chrominance(90);
            table.precision = precision;
            if precision == 1 {
                table.values[5] = 1000;
            }
            let mut out = Vec::new();
            table.write(&mut ByteWriter::new(&mut out), 2)?;
            assert_eq!(out.len(), table.encoded_len());
            let (dest, read) = QuantTable::read(&mut ByteReader::new(&out))?;
            assert_eq!(dest, 2);
            assert_eq!(read, table);
        }
        Ok(())
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(matches!(
            QuantTable::read(&mut ByteReader::new(&[0x20])),
            Err(Error::InvalidQuantPrecision(2))
        ));
        assert!(matches!(
            QuantTable::read(&mut ByteReader::new(&[0x04])),
            Err(Error::InvalidQuantTableIndex(4))
        ));
        assert!(matches!(
            QuantTable::read(&mut ByteReader::new(&[0x00, 1, 2])),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn dequantize_quantize_within_half_step() {
        let table = QuantTable::luminance(40);
        arbtest::arbtest(|u| {
            let mut dct = [0.0f32; BLOCK_SIZE];
            for v in dct.iter_mut() {
                *v = u.int_in_range(-16384..=16384)? as f32 / 8.0;
            }
            let mut coeffs = [0; BLOCK_SIZE];
            table.quantize(&dct, &mut coeffs);
            let mut back = [0.0; BLOCK_SIZE];
            table.dequantize(&coeffs, &mut back);
            for i in 0..BLOCK_SIZE {
                assert_almost_eq!(back[i], dct[i], table.values[i] as f32 / 2.0 + 1e-3);
            }
            Ok(())
        });
    }

    #[test]
    fn flat_block_survives_the_transform() {
        let table = QuantTable::luminance(75);
        let samples = [200.0; BLOCK_SIZE];
        let coeffs = table.compress(&samples, 128.0);
        assert_eq!(coeffs[0], ((72.0 * 8.0) / 8.0f32).round() as i32);
        assert!(coeffs[1..].iter().all(|&c| c == 0));
        let back = table.reconstruct(&coeffs, 128.0);
        for v in back {
            assert_almost_eq!(v, 200.0, 0.5);
        }
    }
}
