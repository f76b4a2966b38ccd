// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::SimdDescriptor;

#[derive(Clone, Copy, Debug)]
pub struct ScalarDescriptor;

impl SimdDescriptor for ScalarDescriptor {
    const UNPACK12_CHUNK_BYTES: usize = 3;
    const UNPACK12_READ_BYTES: usize = 3;

    fn new() -> Option<Self> {
        Some(Self)
    }

    fn call<R>(self, f: impl FnOnce(Self) -> R) -> R {
        // No special features needed for scalar implementation
        f(self)
    }

    #[inline(always)]
    fn unpack12_chunk(self, input: &[u8], output: &mut [u8]) {
        let (b0, b1, b2) = (input[0] as u16, input[1] as u16, input[2] as u16);
        let s0 = (b0 << 4) | (b1 >> 4);
        let s1 = ((b1 & 0x0f) << 8) | b2;
        output[..2].copy_from_slice(&s0.to_le_bytes());
        output[2..4].copy_from_slice(&s1.to_le_bytes());
    }
}
