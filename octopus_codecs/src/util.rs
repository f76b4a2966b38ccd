// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod tracing_wrappers;

use crate::error::{Error, Result};

/// Allocates a vector of `len` copies of `value`, reporting allocation failure instead of
/// aborting.
pub fn new_filled_vec<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, value);
    Ok(v)
}

pub fn new_zeroed_vec<T: Default + Clone>(len: usize) -> Result<Vec<T>> {
    new_filled_vec(len, T::default())
}

/// Multiplies image dimensions, failing on overflow.
pub fn checked_area(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or(Error::InvalidImageSize(width, height))
}

pub trait FloorLog2 {
    fn floor_log2(self) -> u32;
}

impl FloorLog2 for u32 {
    fn floor_log2(self) -> u32 {
        debug_assert_ne!(self, 0);
        31 - self.leading_zeros()
    }
}
