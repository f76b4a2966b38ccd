// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

#[cfg(target_arch = "x86_64")]
mod x86_64;

mod scalar;
pub mod unpack;

#[cfg(target_arch = "x86_64")]
pub use x86_64::avx::AvxDescriptor;

pub use scalar::ScalarDescriptor;

/// An instruction set that is known to be available at runtime.
///
/// Descriptors can only be obtained through [`SimdDescriptor::new`], which performs CPU feature
/// detection, so holding a value is proof that the corresponding kernels may run.
pub trait SimdDescriptor: Sized + Copy + Debug + Send + Sync {
    /// Packed input bytes consumed by one call to [`SimdDescriptor::unpack12_chunk`].
    const UNPACK12_CHUNK_BYTES: usize;

    /// Bytes that must be readable, starting at the chunk, for one call to
    /// [`SimdDescriptor::unpack12_chunk`]. Never smaller than `UNPACK12_CHUNK_BYTES`.
    const UNPACK12_READ_BYTES: usize;

    fn new() -> Option<Self>;

    /// Calls the given closure within a target feature context.
    /// This enables establishing an unbroken chain of inline functions from the feature-annotated
    /// gateway up to the closure, allowing SIMD intrinsics to be used safely.
    fn call<R>(self, f: impl FnOnce(Self) -> R) -> R;

    /// Expands one chunk of big-endian packed 12-bit samples (two samples per three bytes) into
    /// little-endian 16-bit samples.
    ///
    /// Requires `input.len() >= Self::UNPACK12_READ_BYTES` and
    /// `output.len() >= Self::UNPACK12_CHUNK_BYTES / 3 * 4` or it will panic.
    fn unpack12_chunk(self, input: &[u8], output: &mut [u8]);
}

#[cfg(not(target_arch = "x86_64"))]
#[macro_export]
macro_rules! simd_function {
    (
        $dname:ident,
        $descr:ident: $descr_ty:ident,
        $(#[$($attr:meta)*])*
        $pub:vis fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty )? $body: block
    ) => {
        #[inline(always)]
        $(#[$($attr)*])*
        $pub fn $name<$descr_ty: $crate::SimdDescriptor>($descr: $descr_ty, $($arg: $ty),*) $(-> $ret)? $body
        $(#[$($attr)*])*
        $pub fn $dname($($arg: $ty),*) $(-> $ret)? {
            $name($crate::ScalarDescriptor, $($arg),*)
        }
    };
}

#[cfg(not(target_arch = "x86_64"))]
#[macro_export]
macro_rules! test_all_instruction_sets {
    (
        $name:ident
    ) => {
        paste::paste! {
            #[test]
            fn [<$name _scalar>]() {
                $name($crate::ScalarDescriptor)
            }
        }
    };
}

#[cfg(not(target_arch = "x86_64"))]
#[macro_export]
macro_rules! bench_all_instruction_sets {
    (
        $name:ident,
        $criterion:ident
    ) => {
        $name($crate::ScalarDescriptor, $criterion, "scalar");
    };
}

#[cfg(test)]
mod test {
    use crate::{ScalarDescriptor, SimdDescriptor, test_all_instruction_sets};

    fn test_call<D: SimdDescriptor>(d: D) {
        let result = d.call(|_d| 42);
        assert_eq!(result, 42);

        // Captured state must be visible inside the target feature context.
        let input: Vec<u8> = (0..D::UNPACK12_READ_BYTES).map(|i| i as u8).collect();
        let mut output = vec![0u8; D::UNPACK12_CHUNK_BYTES / 3 * 4];
        d.call(|d| d.unpack12_chunk(&input, &mut output));

        let mut expected = vec![0u8; output.len()];
        for (src, dst) in input[..D::UNPACK12_CHUNK_BYTES]
            .chunks_exact(3)
            .zip(expected.chunks_exact_mut(4))
        {
            ScalarDescriptor.unpack12_chunk(src, dst);
        }
        assert_eq!(output, expected);
    }
    test_all_instruction_sets!(test_call);

    fn test_chunk_geometry<D: SimdDescriptor>(_d: D) {
        assert_eq!(D::UNPACK12_CHUNK_BYTES % 3, 0);
        assert!(D::UNPACK12_READ_BYTES >= D::UNPACK12_CHUNK_BYTES);
    }
    test_all_instruction_sets!(test_chunk_geometry);
}
