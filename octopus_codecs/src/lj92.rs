// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Lossless JPEG (ITU T.81 Annex H) in the form raw cameras write it: one SOF3 frame whose
//! components are all sampled 1x1, coded in a single interleaved scan.

mod decoder;
mod encoder;
mod huffman;

pub use decoder::{Lj92Decoder, Lj92Header};
pub use encoder::{Lj92EncoderOptions, encode_lj92};

use crate::coeffs::encode_cat;

/// Most components a lossless frame may carry.
pub const MAX_COMPONENTS: usize = 4;

/// Predictor `Ss` from the left (`ra`), above (`rb`) and above-left (`rc`) samples
/// (Table H.1).
#[inline(always)]
fn predict(predictor: u8, ra: i32, rb: i32, rc: i32) -> i32 {
    match predictor {
        1 => ra,
        2 => rb,
        3 => rc,
        4 => ra + rb - rc,
        5 => ra + ((rb - rc) >> 1),
        6 => rb + ((ra - rc) >> 1),
        7 => (ra + rb) >> 1,
        // 0 has no prediction.
        _ => 0,
    }
}

/// Reduces a prediction error modulo 2^16 into -32767..=32768.
#[inline(always)]
fn wrap_diff(diff: i32) -> i32 {
    let diff = diff & 0xffff;
    if diff > 32768 { diff - 65536 } else { diff }
}

#[inline(always)]
fn diff_category(diff: i32) -> u8 {
    if diff == 32768 { 16 } else { encode_cat(diff) }
}
