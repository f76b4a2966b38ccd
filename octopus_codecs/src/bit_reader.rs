// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Byte-level and entropy-coded-segment readers.
//!
//! [`ByteReader`] walks marker segments (big-endian words, nibble pairs). [`BitReader`] consumes
//! the MSB-first bits of an entropy-coded segment, removing stuffed `0x00` bytes and stopping in
//! front of the first marker.

use std::fmt::Debug;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Outcome of a read from an entropy-coded segment.
///
/// Reaching a marker is a clean segment boundary, not a failure, so it is reported separately
/// from [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bits<T> {
    Data(T),
    /// The next bytes of the stream are a marker; nothing more can be read from this segment.
    Marker,
}

/// Unwraps [`Bits::Data`], or returns `Ok(Bits::Marker)` from the enclosing function.
macro_rules! try_bits {
    ($e:expr) => {
        match $e? {
            $crate::bit_reader::Bits::Data(v) => v,
            $crate::bit_reader::Bits::Marker => return Ok($crate::bit_reader::Bits::Marker),
        }
    };
}
pub(crate) use try_bits;

/// Reads bytes, words and markers from a JPEG codestream.
#[derive(Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Debug for ByteReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ByteReader{{ data: [{} bytes], pos: {} }}",
            self.data.len(),
            self.pos
        )
    }
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unread part of the stream.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.pos).ok_or(Error::OutOfBounds)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a big-endian 16-bit word.
    /// ```
    /// # use octopus_codecs::bit_reader::ByteReader;
    /// let mut br = ByteReader::new(&[0x12, 0x34, 0x56]);
    /// assert_eq!(br.read_u16()?, 0x1234);
    /// assert!(br.read_u16().is_err());
    /// # Ok::<(), octopus_codecs::error::Error>(())
    /// ```
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_slice(2)?;
        Ok(BigEndian::read_u16(bytes))
    }

    /// Reads a byte and splits it into its high and low nibbles.
    pub fn read_nibbles(&mut self) -> Result<(u8, u8)> {
        let byte = self.read_u8()?;
        Ok((byte >> 4, byte & 0x0f))
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::OutOfBounds)?;
        let slice = self.data.get(self.pos..end).ok_or(Error::OutOfBounds)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_slice(len).map(|_| ())
    }

    /// Advances by `len` bytes, which must have been consumed by a [`BitReader`] over
    /// [`ByteReader::rest`].
    pub fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.data.len());
    }

    /// Reads the segment length word and returns the payload length that follows it.
    pub fn read_segment_length(&mut self, segment: &'static str) -> Result<usize> {
        let len = self.read_u16()?;
        if len < 2 || len as usize - 2 > self.remaining() {
            return Err(Error::InvalidSegmentLength(len, segment));
        }
        Ok(len as usize - 2)
    }

    /// Searches for the next marker, skipping fill bytes and anything that is not a marker.
    ///
    /// Returns the marker code and the number of bytes skipped before its `0xFF` prefix.
    /// ```
    /// # use octopus_codecs::bit_reader::ByteReader;
    /// let mut br = ByteReader::new(&[0x12, 0xff, 0x00, 0xff, 0xff, 0xd9]);
    /// assert_eq!(br.read_marker()?, (0xffd9, 3));
    /// assert!(br.read_marker().is_err());
    /// # Ok::<(), octopus_codecs::error::Error>(())
    /// ```
    pub fn read_marker(&mut self) -> Result<(u16, usize)> {
        let start = self.pos;
        loop {
            while self.read_u8()? != 0xff {}
            let marker_start = self.pos - 1;
            loop {
                match self.read_u8()? {
                    0xff => continue,
                    0x00 => break,
                    code => return Ok((0xff00 | code as u16, marker_start - start)),
                }
            }
        }
    }
}

enum Refill {
    Loaded,
    Marker,
    End,
}

/// Reads MSB-first bits from an entropy-coded segment.
///
/// A `0xFF 0x00` pair is read as a literal `0xFF`; a `0xFF` followed by any other byte ends the
/// segment and is left unread.
#[derive(Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u64,
    bits_in_buf: u32,
    total_bits_read: usize,
}

impl Debug for BitReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitReader{{ data: [{} bytes], pos: {}, bit_buf: {:0width$b}, total_bits_read: {} }}",
            self.data.len(),
            self.pos,
            self.bit_buf,
            self.total_bits_read,
            width = self.bits_in_buf as usize
        )
    }
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> BitReader<'a> {
        BitReader {
            data,
            pos: 0,
            bit_buf: 0,
            bits_in_buf: 0,
            total_bits_read: 0,
        }
    }

    fn refill_byte(&mut self) -> Refill {
        let Some(&byte) = self.data.get(self.pos) else {
            return Refill::End;
        };
        let value = if byte == 0xff {
            match self.data.get(self.pos + 1) {
                Some(0x00) => {
                    self.pos += 2;
                    0xff
                }
                Some(_) => return Refill::Marker,
                None => return Refill::End,
            }
        } else {
            self.pos += 1;
            byte
        };
        self.bit_buf = (self.bit_buf << 8) | value as u64;
        self.bits_in_buf += 8;
        Refill::Loaded
    }

    /// Reads a single bit, loading one byte of the stream when the buffer is empty.
    pub fn next_bit(&mut self) -> Result<Bits<u8>> {
        if self.bits_in_buf == 0 {
            match self.refill_byte() {
                Refill::Loaded => {}
                Refill::Marker => return Ok(Bits::Marker),
                Refill::End => return Err(Error::OutOfBounds),
            }
        }
        self.bits_in_buf -= 1;
        self.total_bits_read += 1;
        Ok(Bits::Data(((self.bit_buf >> self.bits_in_buf) & 1) as u8))
    }

    /// Reads `num` (at most 16) bits, most significant first.
    /// ```
    /// # use octopus_codecs::bit_reader::{BitReader, Bits};
    /// let mut br = BitReader::new(&[0xab, 0xff, 0x00, 0xff, 0xd9]);
    /// assert_eq!(br.read_bits(4)?, Bits::Data(0xa));
    /// assert_eq!(br.read_bits(12)?, Bits::Data(0xbff));
    /// assert_eq!(br.read_bits(1)?, Bits::Marker);
    /// assert_eq!(br.position(), 3);
    /// # Ok::<(), octopus_codecs::error::Error>(())
    /// ```
    pub fn read_bits(&mut self, num: u8) -> Result<Bits<u16>> {
        debug_assert!(num <= 16);
        let mut value = 0u16;
        for _ in 0..num {
            let bit = try_bits!(self.next_bit());
            value = (value << 1) | bit as u16;
        }
        Ok(Bits::Data(value))
    }

    /// Returns the next `num` (at most 24) bits without consuming them.
    ///
    /// Bits past a marker or past the end of the data read as zero; consuming them fails.
    pub fn peek_bits(&mut self, num: u32) -> u32 {
        debug_assert!(num <= 24);
        while self.bits_in_buf < num {
            match self.refill_byte() {
                Refill::Loaded => {}
                Refill::Marker | Refill::End => {
                    let missing = num - self.bits_in_buf;
                    let padded = (self.bit_buf << missing) & ((1u64 << num) - 1);
                    return padded as u32;
                }
            }
        }
        ((self.bit_buf >> (self.bits_in_buf - num)) & ((1u64 << num) - 1)) as u32
    }

    /// Drops `num` bits previously returned by [`BitReader::peek_bits`].
    pub fn consume(&mut self, num: u32) -> Result<()> {
        if self.bits_in_buf < num {
            return Err(Error::OutOfBounds);
        }
        self.bits_in_buf -= num;
        self.bit_buf &= (1u64 << self.bits_in_buf) - 1;
        self.total_bits_read += num as usize;
        Ok(())
    }

    /// Discards the bits left in the current byte, as required before a restart marker.
    pub fn align(&mut self) {
        self.bits_in_buf = 0;
        self.bit_buf = 0;
    }

    /// Byte offset of the first byte that has not been loaded into the bit buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns true if the next byte in the stream starts a marker.
    pub fn at_marker(&self) -> bool {
        matches!(self.data.get(self.pos..self.pos + 2), Some(&[0xff, b]) if b != 0x00)
    }

    pub fn total_bits_read(&self) -> usize {
        self.total_bits_read
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn destuffs_ff00() -> Result<()> {
        let mut br = BitReader::new(&[0xff, 0x00, 0x80]);
        assert_eq!(br.read_bits(8)?, Bits::Data(0xff));
        assert_eq!(br.next_bit()?, Bits::Data(1));
        assert_eq!(br.read_bits(7)?, Bits::Data(0));
        assert!(br.next_bit().is_err());
        Ok(())
    }

    #[test]
    fn stops_in_front_of_marker() -> Result<()> {
        let data = [0x5a, 0xff, 0xd0, 0x12];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(8)?, Bits::Data(0x5a));
        assert!(br.at_marker());
        assert_eq!(br.next_bit()?, Bits::Marker);
        // Asking again does not move past the marker.
        assert_eq!(br.next_bit()?, Bits::Marker);
        assert_eq!(br.position(), 1);
        Ok(())
    }

    #[test]
    fn peek_pads_with_zeros_at_marker() -> Result<()> {
        let mut br = BitReader::new(&[0b1011_0000, 0xff, 0xd9]);
        assert_eq!(br.peek_bits(12), 0b1011_0000_0000);
        br.consume(4)?;
        assert_eq!(br.peek_bits(4), 0);
        br.consume(4)?;
        assert!(br.consume(1).is_err());
        assert_eq!(br.total_bits_read(), 8);
        Ok(())
    }

    #[test]
    fn align_drops_partial_byte() -> Result<()> {
        let mut br = BitReader::new(&[0xf0, 0x0f]);
        assert_eq!(br.read_bits(3)?, Bits::Data(0b111));
        br.align();
        assert_eq!(br.read_bits(8)?, Bits::Data(0x0f));
        Ok(())
    }

    #[test]
    fn byte_reader_segments() -> Result<()> {
        let data = [0x00, 0x05, 0xab, 0xcd, 0xef, 0x00];
        let mut br = ByteReader::new(&data);
        assert_eq!(br.read_segment_length("TEST")?, 3);
        assert_eq!(br.read_nibbles()?, (0xa, 0xb));
        br.skip(2)?;
        assert_eq!(br.remaining(), 1);
        assert!(br.skip(2).is_err());

        let mut br = ByteReader::new(&[0x00, 0x09, 0x00]);
        assert!(matches!(
            br.read_segment_length("DQT"),
            Err(Error::InvalidSegmentLength(9, "DQT"))
        ));
        Ok(())
    }
}
