// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Codestream writers mirroring [`crate::bit_reader`].

use crate::error::Result;

/// Appends marker segments to a codestream buffer.
pub struct ByteWriter<'a> {
    out: &'a mut Vec<u8>,
}

impl<'a> ByteWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> ByteWriter<'a> {
        ByteWriter { out }
    }

    pub fn write_u8(&mut self, byte: u8) -> Result<()> {
        self.out.try_reserve(1)?;
        self.out.push(byte);
        Ok(())
    }

    pub fn write_u16(&mut self, word: u16) -> Result<()> {
        self.write_slice(&word.to_be_bytes())
    }

    pub fn write_nibbles(&mut self, first: u8, second: u8) -> Result<()> {
        self.write_u8((first << 4) | (second & 0x0f))
    }

    pub fn write_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.try_reserve(bytes.len())?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_marker(&mut self, marker: u16) -> Result<()> {
        debug_assert_eq!(marker >> 8, 0xff);
        self.write_u16(marker)
    }

    /// Starts a marker segment whose payload is `payload_len` bytes long.
    pub fn write_segment_header(&mut self, marker: u16, payload_len: usize) -> Result<()> {
        self.write_marker(marker)?;
        self.write_u16((payload_len + 2) as u16)
    }

    pub fn bit_writer(&mut self) -> BitWriter<'_> {
        BitWriter::new(&mut *self.out)
    }
}

/// Writes MSB-first bits into an entropy-coded segment, stuffing a `0x00` after every `0xFF`.
pub struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    byte: u8,
    count: u8,
}

impl<'a> BitWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>) -> BitWriter<'a> {
        BitWriter {
            out,
            byte: 0,
            count: 0,
        }
    }

    fn write_ecs_byte(&mut self, byte: u8) -> Result<()> {
        self.out.try_reserve(2)?;
        self.out.push(byte);
        if byte == 0xff {
            self.out.push(0x00);
        }
        Ok(())
    }

    pub fn put_bit(&mut self, bit: u8) -> Result<()> {
        self.byte = (self.byte << 1) | (bit & 1);
        self.count += 1;
        if self.count == 8 {
            self.write_ecs_byte(self.byte)?;
            self.byte = 0;
            self.count = 0;
        }
        Ok(())
    }

    /// Writes the low `count` bits of `value`, most significant first.
    pub fn put_bits(&mut self, value: u32, count: u8) -> Result<()> {
        for s in (0..count).rev() {
            self.put_bit(((value >> s) & 1) as u8)?;
        }
        Ok(())
    }

    /// Pads the pending partial byte with 1-bits and writes it out.
    pub fn flush(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        while self.count != 0 {
            self.put_bit(1)?;
        }
        Ok(())
    }

    /// Appends a marker after the entropy-coded data, flushing pending bits first.
    pub fn write_marker(&mut self, marker: u16) -> Result<()> {
        self.flush()?;
        self.out.try_reserve(2)?;
        self.out.extend_from_slice(&marker.to_be_bytes());
        Ok(())
    }
}
