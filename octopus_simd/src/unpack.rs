// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Expansion of big-endian bit-packed sensor samples into 16-bit little-endian samples.
//!
//! All kernels consume whole packing groups only: trailing input bytes that do not form a complete
//! group are ignored. The number of samples written is returned.

use crate::{ScalarDescriptor, SimdDescriptor, simd_function};

/// Number of packed bytes holding `samples` samples of `bits` bits, rounded up to whole groups.
pub const fn packed_len(samples: usize, bits: usize) -> usize {
    let group_samples = match bits {
        10 => 4,
        12 => 2,
        14 => 4,
        _ => 1,
    };
    samples.div_ceil(group_samples) * group_samples * bits / 8
}

simd_function!(
    unpack12,
    d: D,
    /// Unpacks 12-bit samples, two per three bytes, using the widest available instruction set.
    ///
    /// Panics if `output` cannot hold `input.len() / 3 * 4` bytes.
    pub fn unpack12_with(input: &[u8], output: &mut [u8]) -> usize {
        let groups = input.len() / 3;
        assert!(output.len() >= groups * 4);
        let mut pos = 0;
        let mut out = 0;
        while pos + D::UNPACK12_READ_BYTES <= input.len() {
            d.unpack12_chunk(&input[pos..], &mut output[out..]);
            pos += D::UNPACK12_CHUNK_BYTES;
            out += D::UNPACK12_CHUNK_BYTES / 3 * 4;
        }
        while pos + 3 <= input.len() {
            ScalarDescriptor.unpack12_chunk(&input[pos..], &mut output[out..]);
            pos += 3;
            out += 4;
        }
        groups * 2
    }
);

/// Unpacks 10-bit samples, four per five bytes.
///
/// Panics if `output` cannot hold `input.len() / 5 * 8` bytes.
pub fn unpack10(input: &[u8], output: &mut [u8]) -> usize {
    let groups = input.len() / 5;
    assert!(output.len() >= groups * 8);
    for (src, dst) in input.chunks_exact(5).zip(output.chunks_exact_mut(8)) {
        let b = [src[0], src[1], src[2], src[3], src[4]].map(u16::from);
        let samples = [
            (b[0] << 2) | (b[1] >> 6),
            ((b[1] & 0x3f) << 4) | (b[2] >> 4),
            ((b[2] & 0x0f) << 6) | (b[3] >> 2),
            ((b[3] & 0x03) << 8) | b[4],
        ];
        for (s, d) in samples.iter().zip(dst.chunks_exact_mut(2)) {
            d.copy_from_slice(&s.to_le_bytes());
        }
    }
    groups * 4
}

/// Unpacks 14-bit samples, four per seven bytes.
///
/// Panics if `output` cannot hold `input.len() / 7 * 8` bytes.
pub fn unpack14(input: &[u8], output: &mut [u8]) -> usize {
    let groups = input.len() / 7;
    assert!(output.len() >= groups * 8);
    for (src, dst) in input.chunks_exact(7).zip(output.chunks_exact_mut(8)) {
        let b = [src[0], src[1], src[2], src[3], src[4], src[5], src[6]].map(u16::from);
        let samples = [
            (b[0] << 6) | (b[1] >> 2),
            ((b[1] & 0x03) << 12) | (b[2] << 4) | (b[3] >> 4),
            ((b[3] & 0x0f) << 10) | (b[4] << 2) | (b[5] >> 6),
            ((b[5] & 0x3f) << 8) | b[6],
        ];
        for (s, d) in samples.iter().zip(dst.chunks_exact_mut(2)) {
            d.copy_from_slice(&s.to_le_bytes());
        }
    }
    groups * 4
}
