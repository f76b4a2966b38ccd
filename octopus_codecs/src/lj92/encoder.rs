// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{MAX_COMPONENTS, diff_category, predict, wrap_diff};
use crate::{
    bit_writer::{BitWriter, ByteWriter},
    coeffs::encode_extra,
    error::{Error, Result},
    huffman::{FrequencyModel, HuffmanTable, TableClass},
    markers,
    util::{checked_area, tracing_wrappers::*},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lj92EncoderOptions {
    /// Selection value `Ss`, 0..=7.
    pub predictor: u8,
    /// Low-order bits dropped from every sample before coding.
    pub point_transform: u8,
}

impl Default for Lj92EncoderOptions {
    fn default() -> Self {
        Lj92EncoderOptions {
            predictor: 1,
            point_transform: 0,
        }
    }
}

pub(super) fn write_frame_header(
    w: &mut ByteWriter,
    precision: u8,
    width: usize,
    height: usize,
    num_components: usize,
) -> Result<()> {
    w.write_segment_header(markers::SOF3, 6 + 3 * num_components)?;
    w.write_u8(precision)?;
    w.write_u16(height as u16)?;
    w.write_u16(width as u16)?;
    w.write_u8(num_components as u8)?;
    for c in 0..num_components as u8 {
        w.write_u8(c)?;
        w.write_nibbles(1, 1)?;
        w.write_u8(0)?;
    }
    Ok(())
}

/// Writes a scan over all components, component `c` using DC table `c`.
pub(super) fn write_scan_header(
    w: &mut ByteWriter,
    num_components: usize,
    predictor: u8,
    point_transform: u8,
) -> Result<()> {
    w.write_segment_header(markers::SOS, 4 + 2 * num_components)?;
    w.write_u8(num_components as u8)?;
    for c in 0..num_components as u8 {
        w.write_u8(c)?;
        w.write_nibbles(c, 0)?;
    }
    w.write_u8(predictor)?;
    w.write_u8(0)?;
    w.write_nibbles(0, point_transform)
}

pub(super) fn write_diff(bw: &mut BitWriter, table: &HuffmanTable, diff: i32) -> Result<()> {
    let cat = diff_category(diff);
    table.write_symbol(bw, cat)?;
    // Category 16 carries no extra bits.
    if (1..16).contains(&cat) {
        bw.put_bits(encode_extra(diff, cat) as u32, cat)?;
    }
    Ok(())
}

/// Calls `f(component, difference)` in coding order, predicting the way the decoder does.
fn for_each_diff(
    samples: &[u16],
    width: usize,
    num_components: usize,
    options: &Lj92EncoderOptions,
    initial: i32,
    mut f: impl FnMut(usize, i32) -> Result<()>,
) -> Result<()> {
    let pt = options.point_transform;
    let line = width * num_components;
    let at = |i: usize| (samples[i] >> pt) as i32;
    for i in 0..samples.len() {
        let (y, x) = (i / line, i % line);
        let c = x % num_components;
        let prediction = match (y, x < num_components) {
            (0, true) => initial,
            (0, false) => at(i - num_components),
            (_, true) => at(i - line),
            _ => predict(
                options.predictor,
                at(i - num_components),
                at(i - line),
                at(i - line - num_components),
            ),
        };
        f(c, wrap_diff(at(i) - prediction))?;
    }
    Ok(())
}

/// Encodes `width * height` pixels of `num_components` interleaved samples each as a
/// lossless JPEG stream, with one optimized table per component.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(samples)))]
pub fn encode_lj92(
    samples: &[u16],
    width: usize,
    height: usize,
    num_components: usize,
    precision: u8,
    options: &Lj92EncoderOptions,
) -> Result<Vec<u8>> {
    let pt = options.point_transform;
    if options.predictor > 7 {
        return Err(Error::InvalidPredictor(options.predictor));
    }
    if !(2..=16).contains(&precision) {
        return Err(Error::InvalidPrecision(precision));
    }
    if pt >= precision {
        return Err(Error::InvalidPointTransform(pt, precision));
    }
    if !(1..=MAX_COMPONENTS).contains(&num_components) {
        return Err(Error::InvalidComponentCount(num_components));
    }
    let max_dim = u16::MAX as usize;
    if width == 0 || height == 0 || width > max_dim || height > max_dim {
        return Err(Error::InvalidImageSize(width, height));
    }
    let len = checked_area(width, height)?
        .checked_mul(num_components)
        .ok_or(Error::ArithmeticOverflow)?;
    let samples = samples.get(..len).ok_or(Error::OutOfBounds)?;
    if let Some(&s) = samples.iter().find(|&&s| (s as u32) >> precision != 0) {
        return Err(Error::SampleOutOfRange(s, precision));
    }

    let initial = 1 << (precision - pt - 1);
    let mut models = vec![FrequencyModel::new(); num_components];
    for_each_diff(samples, width, num_components, options, initial, |c, diff| {
        models[c].add(diff_category(diff));
        Ok(())
    })?;
    let mut specs = Vec::with_capacity(num_components);
    for model in &models {
        specs.push(
            model
                .build_spec()?
                .ok_or(Error::InvalidHuffmanTable("no differences to code"))?,
        );
    }
    let tables = specs
        .iter()
        .map(|spec| HuffmanTable::new(spec.clone()))
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::new();
    let mut w = ByteWriter::new(&mut out);
    w.write_marker(markers::SOI)?;
    write_frame_header(&mut w, precision, width, height, num_components)?;
    let dht_len = specs.iter().map(|spec| 1 + spec.encoded_len()).sum();
    w.write_segment_header(markers::DHT, dht_len)?;
    for (c, spec) in specs.iter().enumerate() {
        spec.write(&mut w, TableClass::Dc, c as u8)?;
    }
    write_scan_header(&mut w, num_components, options.predictor, pt)?;
    let mut bw = w.bit_writer();
    for_each_diff(samples, width, num_components, options, initial, |c, diff| {
        write_diff(&mut bw, &tables[c], diff)
    })?;
    bw.write_marker(markers::EOI)?;
    debug!(bytes = out.len(), "encoded lossless");
    Ok(out)
}
