// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::super::SimdDescriptor;
use std::arch::x86_64::*;

// Safety invariant: this type is only ever constructed if avx2 is available.
#[derive(Clone, Copy, Debug)]
pub struct AvxDescriptor(());

impl AvxDescriptor {
    /// # Safety
    /// The caller must guarantee that the "avx2" target feature is available.
    pub unsafe fn new_unchecked() -> Self {
        Self(())
    }
}

impl SimdDescriptor for AvxDescriptor {
    // Eight groups of three bytes, sixteen samples.
    const UNPACK12_CHUNK_BYTES: usize = 24;
    // The upper half is loaded as 16 bytes starting at offset 12.
    const UNPACK12_READ_BYTES: usize = 28;

    fn new() -> Option<Self> {
        if is_x86_feature_detected!("avx2") {
            // SAFETY: we just checked avx2.
            Some(unsafe { Self::new_unchecked() })
        } else {
            None
        }
    }

    fn call<R>(self, f: impl FnOnce(Self) -> R) -> R {
        #[target_feature(enable = "avx2")]
        #[inline(never)]
        unsafe fn inner<R>(d: AvxDescriptor, f: impl FnOnce(AvxDescriptor) -> R) -> R {
            f(d)
        }
        // SAFETY: the safety invariant on `self` guarantees avx2.
        unsafe { inner(self, f) }
    }

    #[inline(always)]
    fn unpack12_chunk(self, input: &[u8], output: &mut [u8]) {
        #[target_feature(enable = "avx2")]
        #[inline]
        fn inner(input: &[u8], output: &mut [u8]) {
            assert!(input.len() >= AvxDescriptor::UNPACK12_READ_BYTES);
            assert!(output.len() >= 32);
            // SAFETY: we just checked that `input` holds at least 28 bytes, so both 16-byte
            // loads are in bounds.
            let (lo, hi) = unsafe {
                (
                    _mm_loadu_si128(input.as_ptr().cast()),
                    _mm_loadu_si128(input[12..].as_ptr().cast()),
                )
            };
            // Each 128-bit lane now starts with four 3-byte groups [b0 b1 b2].
            let v = _mm256_inserti128_si256::<1>(_mm256_castsi128_si256(lo), hi);
            // Per group, build the little-endian words (b0 << 8 | b1) and (b1 << 8 | b2).
            #[rustfmt::skip]
            let grouping = _mm256_setr_epi8(
                1, 0, 2, 1, 4, 3, 5, 4, 7, 6, 8, 7, 10, 9, 11, 10,
                1, 0, 2, 1, 4, 3, 5, 4, 7, 6, 8, 7, 10, 9, 11, 10,
            );
            let v = _mm256_shuffle_epi8(v, grouping);
            // Even words keep their top 12 bits, odd words their bottom 12 bits.
            let even = _mm256_srli_epi16::<4>(v);
            let odd = _mm256_and_si256(v, _mm256_set1_epi16(0x0fff));
            let samples = _mm256_blend_epi16::<0b10101010>(even, odd);
            // SAFETY: we just checked that `output` holds at least 32 bytes.
            unsafe { _mm256_storeu_si256(output.as_mut_ptr().cast(), samples) }
        }
        // SAFETY: `self` is constructed iff avx2 is available.
        unsafe { inner(input, output) }
    }
}
