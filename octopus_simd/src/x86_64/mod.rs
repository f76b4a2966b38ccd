// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![allow(unsafe_code)]

pub(super) mod avx;

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
        #[allow(unsafe_code)]
        $(#[$($attr)*])*
        $pub fn $dname($($arg: $ty),*) $(-> $ret)? {
            use $crate::SimdDescriptor;
            if let Some(d) = $crate::AvxDescriptor::new() {
                #[target_feature(enable = "avx2")]
                fn inner(d: $crate::AvxDescriptor, $($arg: $ty),*) $(-> $ret)? {
                    $name(d, $($arg),*)
                }
                // SAFETY: we just checked for avx2.
                return unsafe { inner(d, $($arg),*) };
            }
            $name($crate::ScalarDescriptor, $($arg),*)
        }
    };
}

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
            #[allow(unsafe_code)]
            #[test]
            fn [<$name _avx>]() {
                use $crate::SimdDescriptor;
                let Some(d) = $crate::AvxDescriptor::new() else { return; };
                #[target_feature(enable = "avx2")]
                fn inner(d: $crate::AvxDescriptor) {
                    $name(d)
                }
                // SAFETY: we just checked for avx2.
                return unsafe { inner(d) };
            }
        }
    };
}

#[macro_export]
macro_rules! bench_all_instruction_sets {
    (
        $name:ident,
        $criterion:ident
    ) => {
        use $crate::SimdDescriptor;
        if let Some(d) = $crate::AvxDescriptor::new() {
            #[target_feature(enable = "avx2")]
            fn inner(
                d: $crate::AvxDescriptor,
                criterion: &mut ::criterion::BenchmarkGroup<
                    '_,
                    impl ::criterion::measurement::Measurement,
                >,
                name: &str,
            ) {
                $name(d, criterion, name)
            }
            // SAFETY: we just checked for avx2.
            unsafe { inner(d, $criterion, "avx2") };
        }
        $name($crate::ScalarDescriptor, $criterion, "scalar");
    };
}
