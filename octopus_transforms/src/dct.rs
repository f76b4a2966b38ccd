// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Separable 8x8 DCT-II / DCT-III with the orthonormal JPEG scaling.
//!
//! Blocks are 64 samples in natural (row-major) order. Both directions transform the rows first
//! and the columns second.

#![allow(clippy::needless_range_loop)]

use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::sync::LazyLock;

pub const BLOCK_DIM: usize = 8;
pub const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;

pub type Basis = [[f32; BLOCK_DIM]; BLOCK_DIM];

#[inline(always)]
fn alpha(u: usize) -> f64 {
    if u == 0 { FRAC_1_SQRT_2 } else { 1.0 }
}

// basis[x][u] = C(u) / 2 * cos((2x + 1) * u * pi / 16)
static BASIS: LazyLock<Basis> = LazyLock::new(|| {
    let mut basis = [[0.0; BLOCK_DIM]; BLOCK_DIM];
    for (x, row) in basis.iter_mut().enumerate() {
        for (u, coeff) in row.iter_mut().enumerate() {
            *coeff =
                (0.5 * alpha(u) * (((2 * x + 1) * u) as f64 * PI / 16.0).cos()) as f32;
        }
    }
    basis
});

/// Returns the process-wide cosine basis, computing it on first use.
pub fn basis() -> &'static Basis {
    &BASIS
}

/// Level shift applied around the transform for samples of the given precision.
pub fn level_shift(precision: u8) -> f32 {
    (1u32 << (precision.clamp(1, 16) - 1)) as f32
}

#[inline(always)]
fn idct1(basis: &Basis, data: &[f32], out: &mut [f32], stride: usize) {
    for x in 0..BLOCK_DIM {
        let mut s = 0.0;
        for u in 0..BLOCK_DIM {
            s += data[u * stride] * basis[x][u];
        }
        out[x * stride] = s;
    }
}

#[inline(always)]
fn fdct1(basis: &Basis, data: &[f32], out: &mut [f32], stride: usize) {
    for u in 0..BLOCK_DIM {
        let mut s = 0.0;
        for x in 0..BLOCK_DIM {
            s += data[x * stride] * basis[x][u];
        }
        out[u * stride] = s;
    }
}

/// In-place inverse 2D DCT of a coefficient block.
pub fn idct8x8(block: &mut [f32; BLOCK_SIZE]) {
    let basis = basis();
    let mut tmp = [0.0; BLOCK_SIZE];
    for y in 0..BLOCK_DIM {
        let row = y * BLOCK_DIM..(y + 1) * BLOCK_DIM;
        idct1(basis, &block[row.clone()], &mut tmp[row], 1);
    }
    for x in 0..BLOCK_DIM {
        idct1(basis, &tmp[x..], &mut block[x..], BLOCK_DIM);
    }
}

/// In-place forward 2D DCT of a sample block.
pub fn fdct8x8(block: &mut [f32; BLOCK_SIZE]) {
    let basis = basis();
    let mut tmp = [0.0; BLOCK_SIZE];
    for y in 0..BLOCK_DIM {
        let row = y * BLOCK_DIM..(y + 1) * BLOCK_DIM;
        fdct1(basis, &block[row.clone()], &mut tmp[row], 1);
    }
    for x in 0..BLOCK_DIM {
        fdct1(basis, &tmp[x..], &mut block[x..], BLOCK_DIM);
    }
}

/// Inverse DCT followed by adding the level shift back to every sample.
pub fn idct8x8_shifted(block: &mut [f32; BLOCK_SIZE], shift: f32) {
    idct8x8(block);
    block.iter_mut().for_each(|v| *v += shift);
}

/// Removes the level shift from every sample, then applies the forward DCT.
pub fn fdct8x8_shifted(block: &mut [f32; BLOCK_SIZE], shift: f32) {
    block.iter_mut().for_each(|v| *v -= shift);
    fdct8x8(block);
}
