// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! In-memory PGM (P5) and PPM (P6) images.

use byteorder::{BigEndian, ByteOrder};

use crate::{
    error::{Error, Result},
    frame::Frame,
    util::FloorLog2,
};

struct HeaderReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl HeaderReader<'_> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Skips whitespace and `#` comments running to the end of the line.
    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'#' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<u32> {
        self.skip_separators();
        let start = self.pos;
        let mut value = 0u32;
        while let Some(c @ b'0'..=b'9') = self.peek() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((c - b'0') as u32))
                .ok_or(Error::InvalidPnmHeader)?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::InvalidPnmHeader);
        }
        Ok(value)
    }
}

/// Parses a binary PGM/PPM image. A maxval above 255 means 16-bit big-endian samples.
pub fn read(data: &[u8]) -> Result<Frame> {
    let num_components = match data {
        [b'P', b'5', ..] => 1,
        [b'P', b'6', ..] => 3,
        [b'P', t, ..] => return Err(Error::UnsupportedPnmType(*t as char)),
        _ => return Err(Error::InvalidPnmHeader),
    };
    let mut header = HeaderReader { data, pos: 2 };
    let width = header.read_number()? as usize;
    let height = header.read_number()? as usize;
    let maxval = header.read_number()?;
    if maxval == 0 {
        return Err(Error::InvalidPnmHeader);
    }
    let precision = maxval.floor_log2() + 1;
    if precision > 16 {
        return Err(Error::InvalidPnmHeader);
    }
    // Exactly one whitespace byte separates the header from the samples.
    match header.peek() {
        Some(c) if c.is_ascii_whitespace() => header.pos += 1,
        _ => return Err(Error::InvalidPnmHeader),
    }

    let body = &data[header.pos..];
    let len = width * height * num_components;
    if maxval < 256 {
        let samples = body.get(..len).ok_or(Error::OutOfBounds)?;
        Frame::from_samples(width, height, num_components, precision as u8, samples)
    } else {
        let bytes = body.get(..len * 2).ok_or(Error::OutOfBounds)?;
        let mut samples = vec![0u16; len];
        BigEndian::read_u16_into(bytes, &mut samples);
        Frame::from_samples(width, height, num_components, precision as u8, &samples)
    }
}

/// Serializes the image content of `frame`, rounding and clamping samples. Frames with three or
/// four components are written as PPM (the fourth component is dropped), others as PGM.
pub fn write(frame: &Frame) -> Result<Vec<u8>> {
    let (magic, channels) = match frame.num_components() {
        1 => ("P5", 1),
        3 | 4 => ("P6", 3),
        n => return Err(Error::InvalidComponentCount(n)),
    };
    let maxval = frame.max_value() as u32;
    let mut out = format!(
        "{magic}\n{} {}\n{maxval}\n",
        frame.width(),
        frame.height()
    )
    .into_bytes();
    let samples = frame.quantized_samples(channels);
    if maxval < 256 {
        out.try_reserve(samples.len())?;
        out.extend(samples.iter().map(|&s| s as u8));
    } else {
        let start = out.len();
        out.try_reserve(samples.len() * 2)?;
        out.resize(start + samples.len() * 2, 0);
        BigEndian::write_u16_into(&samples, &mut out[start..]);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn reads_pgm_with_comments() -> Result<()> {
        let mut data = b"P5\n# a comment\n3 # width\n2\n255\n".to_vec();
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let frame = read(&data)?;
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.num_components(), 1);
        assert_eq!(frame.precision(), 8);
        assert_eq!(frame.quantized_samples(1), [1, 2, 3, 4, 5, 6]);
        Ok(())
    }

    #[test]
    fn sixteen_bit_samples_are_big_endian() -> Result<()> {
        let mut data = b"P6 1 1 4095\n".to_vec();
        data.extend_from_slice(&[0x0f, 0xff, 0x01, 0x00, 0x00, 0x10]);
        let frame = read(&data)?;
        assert_eq!(frame.precision(), 12);
        assert_eq!(frame.quantized_samples(3), [4095, 256, 16]);
        let mut expected = b"P6\n1 1\n4095\n".to_vec();
        expected.extend_from_slice(&data[12..]);
        assert_eq!(write(&frame)?, expected);
        Ok(())
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(read(b"P3 1 1 255\n"), Err(Error::UnsupportedPnmType('3'))));
        assert!(matches!(read(b"JPEG"), Err(Error::InvalidPnmHeader)));
        assert!(matches!(read(b"P5 1 1 0\n\0"), Err(Error::InvalidPnmHeader)));
        assert!(matches!(read(b"P5 1 1 70000\n\0"), Err(Error::InvalidPnmHeader)));
        assert!(matches!(read(b"P5 2 2 255\n\0\0"), Err(Error::OutOfBounds)));
        assert!(matches!(read(b"P5 x 2 255\n"), Err(Error::InvalidPnmHeader)));
    }

    #[test]
    fn write_round_trip() -> Result<()> {
        let samples: Vec<u8> = (0..48).map(|i| i * 5).collect();
        let frame = Frame::from_samples(4, 4, 3, 8, &samples)?;
        let data = write(&frame)?;
        assert!(data.starts_with(b"P6\n4 4\n255\n"));
        assert_eq!(read(&data)?.quantized_samples(3), frame.quantized_samples(3));
        Ok(())
    }
}
