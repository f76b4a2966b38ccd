// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Canonical Huffman codes as transmitted in DHT segments (ITU T.81 Annex C).

mod adapt;
pub mod standard;

pub use adapt::FrequencyModel;

use std::fmt::Debug;

use crate::{
    bit_reader::{BitReader, Bits, ByteReader, try_bits},
    bit_writer::{BitWriter, ByteWriter},
    error::{Error, Result},
};

/// Table destinations per class.
pub const NUM_DESTINATIONS: u8 = 4;
/// Longest code length a DHT segment can describe.
pub const MAX_CODE_LENGTH: usize = 16;
/// Most codes a single table can hold.
pub const MAX_CODES: usize = 256;

/// DHT table class. The destination identifiers of the two classes are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableClass {
    Dc = 0,
    Ac = 1,
}

impl TryFrom<u8> for TableClass {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(TableClass::Dc),
            1 => Ok(TableClass::Ac),
            _ => Err(Error::InvalidHuffmanClass(value)),
        }
    }
}

/// Table specification in DHT form: number of codes of each length 1..=16, followed by the
/// symbol values in order of increasing code length.
#[derive(Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    pub counts: [u8; MAX_CODE_LENGTH],
    pub values: Vec<u8>,
}

impl Debug for HuffmanSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HuffmanSpec{{ counts: {:?}, values: [{} symbols] }}",
            self.counts,
            self.values.len()
        )
    }
}

impl HuffmanSpec {
    /// Builds a specification, checking that the symbol list matches the counts.
    pub fn new(counts: [u8; MAX_CODE_LENGTH], values: Vec<u8>) -> Result<HuffmanSpec> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total > MAX_CODES {
            return Err(Error::InvalidHuffmanTable("more than 256 codes"));
        }
        if total != values.len() {
            return Err(Error::InvalidHuffmanTable("symbol count mismatch"));
        }
        Ok(HuffmanSpec { counts, values })
    }

    pub fn num_codes(&self) -> usize {
        self.values.len()
    }

    /// Size of the DHT payload for this table, excluding the class/destination byte.
    pub fn encoded_len(&self) -> usize {
        MAX_CODE_LENGTH + self.values.len()
    }

    /// Reads one table definition of a DHT segment, returning its class and destination.
    pub fn read(br: &mut ByteReader) -> Result<(TableClass, u8, HuffmanSpec)> {
        let (class, dest) = br.read_nibbles()?;
        let class = TableClass::try_from(class)?;
        if dest >= NUM_DESTINATIONS {
            return Err(Error::InvalidHuffmanTableIndex(dest));
        }
        let mut counts = [0u8; MAX_CODE_LENGTH];
        counts.copy_from_slice(br.read_slice(MAX_CODE_LENGTH)?);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total > MAX_CODES {
            return Err(Error::InvalidHuffmanTable("more than 256 codes"));
        }
        let values = br.read_slice(total)?.to_vec();
        Ok((class, dest, HuffmanSpec::new(counts, values)?))
    }

    pub fn write(&self, w: &mut ByteWriter, class: TableClass, dest: u8) -> Result<()> {
        w.write_nibbles(class as u8, dest)?;
        w.write_slice(&self.counts)?;
        w.write_slice(&self.values)
    }
}

/// Code tables derived from a [`HuffmanSpec`].
///
/// `sizes`/`codes` hold HUFFSIZE/HUFFCODE in code order (Figures C.1 and C.2); the per-symbol
/// `ehufco`/`ehufsi` arrays are the encoder view (Figure C.3), with size 0 meaning "no code".
#[derive(Clone)]
pub struct HuffmanTable {
    spec: HuffmanSpec,
    sizes: Vec<u8>,
    codes: Vec<u16>,
    ehufco: [u16; 256],
    ehufsi: [u8; 256],
}

impl Debug for HuffmanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HuffmanTable{{ spec: {:?}, max_code_length: {} }}",
            self.spec,
            self.max_code_length()
        )
    }
}

impl HuffmanTable {
    pub fn new(spec: HuffmanSpec) -> Result<HuffmanTable> {
        // Figure C.1: code sizes.
        let mut sizes = Vec::with_capacity(spec.num_codes());
        for (i, &count) in spec.counts.iter().enumerate() {
            sizes.extend(std::iter::repeat_n(i as u8 + 1, count as usize));
        }

        // Figure C.2: codes increment within a length and shift left on each length increase.
        let mut codes = Vec::with_capacity(sizes.len());
        let mut code = 0u32;
        let mut si = sizes.first().copied().unwrap_or(0);
        for &size in &sizes {
            while size > si {
                code <<= 1;
                si += 1;
            }
            if code >= 1 << size {
                return Err(Error::InvalidHuffmanTable("code space overflow"));
            }
            codes.push(code as u16);
            code += 1;
        }

        // Figure C.3: per-symbol lookup for the encoder.
        let mut ehufco = [0u16; 256];
        let mut ehufsi = [0u8; 256];
        for ((&value, &size), &code) in spec.values.iter().zip(&sizes).zip(&codes) {
            ehufco[value as usize] = code;
            ehufsi[value as usize] = size;
        }

        Ok(HuffmanTable {
            spec,
            sizes,
            codes,
            ehufco,
            ehufsi,
        })
    }

    pub fn spec(&self) -> &HuffmanSpec {
        &self.spec
    }

    pub fn max_code_length(&self) -> u8 {
        self.sizes.last().copied().unwrap_or(0)
    }

    /// Iterates over `(symbol, code, size)` in canonical order.
    pub fn codes(&self) -> impl Iterator<Item = (u8, u16, u8)> + '_ {
        self.spec
            .values
            .iter()
            .zip(&self.codes)
            .zip(&self.sizes)
            .map(|((&value, &code), &size)| (value, code, size))
    }

    /// Returns the symbol whose code is exactly `code` of length `size`.
    pub fn lookup(&self, code: u16, size: u8) -> Option<u8> {
        self.codes()
            .find(|&(_, c, s)| s == size && c == code)
            .map(|(value, _, _)| value)
    }

    /// Returns `(code, size)` for `symbol`, if the table has a code for it.
    pub fn code_for(&self, symbol: u8) -> Option<(u16, u8)> {
        match self.ehufsi[symbol as usize] {
            0 => None,
            size => Some((self.ehufco[symbol as usize], size)),
        }
    }

    /// Decodes one symbol, reading a bit at a time until the accumulated code matches.
    pub fn read_symbol(&self, br: &mut BitReader) -> Result<Bits<u8>> {
        let mut code = 0u16;
        for size in 1..=MAX_CODE_LENGTH as u8 {
            let bit = try_bits!(br.next_bit());
            code = (code << 1) | bit as u16;
            if let Some(value) = self.lookup(code, size) {
                return Ok(Bits::Data(value));
            }
        }
        Err(Error::InvalidHuffmanCode)
    }

    pub fn write_symbol(&self, bw: &mut BitWriter, symbol: u8) -> Result<()> {
        let (code, size) = self
            .code_for(symbol)
            .ok_or(Error::MissingHuffmanSymbol(symbol))?;
        bw.put_bits(code as u32, size)
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::bit_writer::BitWriter;

    fn table(counts: &[u8], values: &[u8]) -> HuffmanTable {
        let mut c = [0u8; 16];
        c[..counts.len()].copy_from_slice(counts);
        HuffmanTable::new(HuffmanSpec::new(c, values.to_vec()).unwrap()).unwrap()
    }

    #[test]
    fn annex_c_codes() {
        // One code of length 2, three of length 3, one of length 4.
        let t = table(&[0, 1, 3, 1], &[7, 1, 2, 3, 9]);
        let codes: Vec<_> = t.codes().collect();
        assert_eq!(
            codes,
            [
                (7, 0b00, 2),
                (1, 0b010, 3),
                (2, 0b011, 3),
                (3, 0b100, 3),
                (9, 0b1010, 4)
            ]
        );
        assert_eq!(t.code_for(9), Some((0b1010, 4)));
        assert_eq!(t.code_for(4), None);
        assert_eq!(t.lookup(0b011, 3), Some(2));
        assert_eq!(t.lookup(0b011, 4), None);
        assert_eq!(t.max_code_length(), 4);
    }

    #[test]
    fn rejects_inconsistent_specs() {
        let mut counts = [0u8; 16];
        counts[0] = 2;
        assert!(HuffmanSpec::new(counts, vec![1]).is_err());
        // Three codes of length 1 do not fit.
        counts[0] = 3;
        let spec = HuffmanSpec::new(counts, vec![1, 2, 3]).unwrap();
        assert!(matches!(
            HuffmanTable::new(spec),
            Err(Error::InvalidHuffmanTable(_))
        ));
    }

    #[test]
    fn standard_tables_are_complete() {
        for spec in [
            standard::dc_luminance(),
            standard::dc_chrominance(),
            standard::ac_luminance(),
            standard::ac_chrominance(),
        ] {
            let t = HuffmanTable::new(spec.clone()).unwrap();
            for &v in &spec.values {
                assert!(t.code_for(v).is_some());
            }
        }
    }

    #[test]
    fn dht_definition_round_trip() -> Result<()> {
        let spec = standard::ac_chrominance();
        let mut out = Vec::new();
        spec.write(&mut ByteWriter::new(&mut out), TableClass::Ac, 1)?;
        assert_eq!(out.len(), 1 + spec.encoded_len());
        assert_eq!(out[0], 0x11);
        let (class, dest, read) = HuffmanSpec::read(&mut ByteReader::new(&out))?;
        assert_eq!((class, dest), (TableClass::Ac, 1));
        assert_eq!(read, spec);

        out[0] = 0x04;
        assert!(matches!(
            HuffmanSpec::read(&mut ByteReader::new(&out)),
            Err(Error::InvalidHuffmanTableIndex(4))
        ));
        out[0] = 0x20;
        assert!(matches!(
            HuffmanSpec::read(&mut ByteReader::new(&out)),
            Err(Error::InvalidHuffmanClass(2))
        ));
        Ok(())
    }

    #[test]
    fn missing_symbol_is_an_error() {
        let t = table(&[2], &[0, 1]);
        let mut out = Vec::new();
        let mut bw = BitWriter::new(&mut out);
        assert!(matches!(
            t.write_symbol(&mut bw, 5),
            Err(Error::MissingHuffmanSymbol(5))
        ));
    }

    #[test]
    fn unknown_code_is_an_error() {
        // Only "0" is a valid code; sixteen 1-bits never match.
        let t = table(&[1], &[4]);
        let data = [0xff, 0x00, 0xff, 0x00, 0x00];
        let mut br = BitReader::new(&data);
        assert!(matches!(
            t.read_symbol(&mut br),
            Err(Error::InvalidHuffmanCode)
        ));
    }

    fn random_spec(
        u: &mut arbtest::arbitrary::Unstructured<'_>,
    ) -> arbtest::arbitrary::Result<HuffmanSpec> {
        // Build counts that respect the Kraft inequality by tracking the free code space.
        let mut counts = [0u8; 16];
        let mut free = 1u32;
        let mut total = 0usize;
        for (i, count) in counts.iter_mut().enumerate() {
            free *= 2;
            // Keep the all-ones code of the last length free, as encoders do.
            let limit = if i == 15 { free.saturating_sub(1) } else { free };
            let max = limit.min((MAX_CODES - total) as u32).min(u8::MAX as u32);
            let c = u.int_in_range(0..=max)?;
            *count = c as u8;
            free -= c;
            total += c as usize;
        }
        let mut symbols: Vec<u8> = (0..=255).collect();
        for i in (1..symbols.len()).rev() {
            let j = u.int_in_range(0..=i)?;
            symbols.swap(i, j);
        }
        symbols.truncate(total);
        Ok(HuffmanSpec::new(counts, symbols).unwrap())
    }

    #[test]
    fn canonical_codes_round_trip() {
        arbtest::arbtest(|u| {
            let spec = random_spec(u)?;
            let t = HuffmanTable::new(spec.clone()).unwrap();
            let mut out = Vec::new();
            {
                let mut bw = BitWriter::new(&mut out);
                for &v in &spec.values {
                    t.write_symbol(&mut bw, v).unwrap();
                }
                bw.write_marker(0xffd9).unwrap();
            }
            let mut br = BitReader::new(&out);
            for &v in &spec.values {
                assert_eq!(t.read_symbol(&mut br).unwrap(), Bits::Data(v));
            }
            Ok(())
        });
    }
}
