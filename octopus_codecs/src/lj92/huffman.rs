// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    huffman::{HuffmanSpec, HuffmanTable},
    util::new_filled_vec,
};

/// Largest difference category of lossless coding.
pub const MAX_DIFF_CATEGORY: u8 = 16;

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    category: u8,
    /// Code length; 0 for windows that start no valid code.
    len: u8,
}

/// Direct-lookup decoder: every `max_len`-bit window maps to the code it starts with.
#[derive(Clone)]
pub struct LookupTable {
    max_len: u8,
    entries: Vec<Entry>,
}

impl Debug for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LookupTable{{ max_len: {} }}", self.max_len)
    }
}

impl LookupTable {
    pub fn new(spec: &HuffmanSpec) -> Result<LookupTable> {
        let table = HuffmanTable::new(spec.clone())?;
        let max_len = table.max_code_length();
        let mut entries = new_filled_vec(1 << max_len, Entry::default())?;
        for (category, code, len) in table.codes() {
            if category > MAX_DIFF_CATEGORY {
                return Err(Error::InvalidHuffmanTable("difference category above 16"));
            }
            let shift = max_len - len;
            let start = (code as usize) << shift;
            entries[start..start + (1 << shift)].fill(Entry { category, len });
        }
        Ok(LookupTable { max_len, entries })
    }

    /// Decodes one difference category.
    ///
    /// Codes cut short by a marker or the end of the data fail with [`Error::OutOfBounds`].
    #[inline]
    pub fn read_category(&self, br: &mut BitReader) -> Result<u8> {
        let window = br.peek_bits(self.max_len as u32);
        let entry = self.entries[window as usize];
        if entry.len == 0 {
            return Err(Error::InvalidHuffmanCode);
        }
        br.consume(entry.len as u32)?;
        Ok(entry.category)
    }
}
