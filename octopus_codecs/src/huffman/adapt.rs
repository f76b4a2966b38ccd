// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Huffman tables fitted to observed symbol statistics (ITU T.81 Annex K.2).

use super::{HuffmanSpec, MAX_CODE_LENGTH};
use crate::error::{Error, Result};

/// Slot 256 is reserved so that no symbol is assigned the all-ones code.
const SENTINEL: usize = 256;
const SLOTS: usize = 257;
const MAX_CLEN: usize = 32;

/// Symbol frequencies collected by a dry encoding pass.
#[derive(Clone, Debug)]
pub struct FrequencyModel {
    freq: [u64; SLOTS],
}

impl Default for FrequencyModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Working state of the `Code_size` procedure (Figure K.1).
struct CodeSizes {
    freq: [u64; SLOTS],
    codesize: [usize; SLOTS],
    others: [Option<u16>; SLOTS],
}

impl CodeSizes {
    /// Finds the slot with the least nonzero frequency, other than `exclude`. Ties go to the
    /// largest slot index.
    fn least_frequent(&self, exclude: Option<usize>) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (v, &f) in self.freq.iter().enumerate() {
            if f == 0 || Some(v) == exclude {
                continue;
            }
            if best.is_none_or(|b| f <= self.freq[b]) {
                best = Some(v);
            }
        }
        best
    }

    fn run(&mut self) -> Result<()> {
        while let Some(mut v1) = self.least_frequent(None) {
            let Some(mut v2) = self.least_frequent(Some(v1)) else {
                break;
            };
            self.freq[v1] += self.freq[v2];
            self.freq[v2] = 0;

            loop {
                self.codesize[v1] += 1;
                match self.others[v1] {
                    Some(next) => v1 = next as usize,
                    None => break,
                }
            }
            self.others[v1] = Some(v2 as u16);
            loop {
                self.codesize[v2] += 1;
                match self.others[v2] {
                    Some(next) => v2 = next as usize,
                    None => break,
                }
            }
        }
        if self.codesize.iter().any(|&s| s > MAX_CLEN) {
            return Err(Error::HuffmanCodeTooLong);
        }
        Ok(())
    }
}

/// Limits code lengths to 16 bits (Figure K.3), then removes the code reserved by the sentinel.
fn adjust_bits(bits: &mut [u32; MAX_CLEN + 1]) {
    let mut i = MAX_CLEN;
    while i > MAX_CODE_LENGTH {
        if bits[i] > 0 {
            let mut j = i - 1;
            loop {
                j -= 1;
                if bits[j] > 0 {
                    break;
                }
            }
            bits[i] -= 2;
            bits[i - 1] += 1;
            bits[j + 1] += 2;
            bits[j] -= 1;
        } else {
            i -= 1;
        }
    }
    while i > 0 && bits[i] == 0 {
        i -= 1;
    }
    if i > 0 {
        bits[i] -= 1;
    }
}

impl FrequencyModel {
    pub fn new() -> FrequencyModel {
        let mut freq = [0; SLOTS];
        freq[SENTINEL] = 1;
        FrequencyModel { freq }
    }

    /// Counts one occurrence of `symbol`.
    pub fn add(&mut self, symbol: u8) {
        self.freq[symbol as usize] += 1;
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.freq[symbol as usize]
    }

    /// Returns true if no symbol has been counted.
    pub fn is_empty(&self) -> bool {
        self.freq[..SENTINEL].iter().all(|&f| f == 0)
    }

    /// Code length assigned to each symbol before the 16-bit limit is applied.
    fn code_sizes(&self) -> Result<[usize; SLOTS]> {
        let mut state = CodeSizes {
            freq: self.freq,
            codesize: [0; SLOTS],
            others: [None; SLOTS],
        };
        state.run()?;
        Ok(state.codesize)
    }

    /// Derives an optimal table for the counted symbols (Figures K.1 to K.4).
    ///
    /// Returns `None` if nothing was counted.
    pub fn build_spec(&self) -> Result<Option<HuffmanSpec>> {
        if self.is_empty() {
            return Ok(None);
        }
        let codesize = self.code_sizes()?;

        // Figure K.2: number of codes of each size.
        let mut bits = [0u32; MAX_CLEN + 1];
        for &size in codesize.iter().filter(|&&s| s != 0) {
            bits[size] += 1;
        }
        adjust_bits(&mut bits);

        // Figure K.4: symbols sorted by code size, ties in symbol order.
        let mut values = Vec::new();
        for size in 1..=MAX_CLEN {
            for (v, _) in codesize[..SENTINEL]
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s == size)
            {
                values.push(v as u8);
            }
        }

        let mut counts = [0u8; MAX_CODE_LENGTH];
        for (count, &b) in counts.iter_mut().zip(&bits[1..=MAX_CODE_LENGTH]) {
            *count = b as u8;
        }
        HuffmanSpec::new(counts, values).map(Some)
    }
}
