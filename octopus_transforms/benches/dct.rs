// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use criterion::{Criterion, criterion_group, criterion_main};
use octopus_transforms::dct::{BLOCK_SIZE, fdct8x8_shifted, idct8x8_shifted, level_shift};
use std::hint::black_box;

fn dct_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("dct8x8");
    let shift = level_shift(8);
    let mut block: [f32; BLOCK_SIZE] = std::array::from_fn(|i| (i * 3 % 255) as f32);

    group.bench_function("forward", |b| {
        b.iter(|| {
            let mut data = block;
            fdct8x8_shifted(black_box(&mut data), shift);
            data
        })
    });

    fdct8x8_shifted(&mut block, shift);
    group.bench_function("inverse", |b| {
        b.iter(|| {
            let mut data = block;
            idct8x8_shifted(black_box(&mut data), shift);
            data
        })
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(50);
    targets = dct_benches
);
criterion_main!(benches);
