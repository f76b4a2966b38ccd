// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{MAX_COMPONENTS, huffman::LookupTable, predict};
use crate::{
    bit_reader::{BitReader, ByteReader},
    coeffs::decode_coeff,
    error::{Error, Result},
    huffman::{HuffmanSpec, NUM_DESTINATIONS, TableClass},
    markers,
    util::tracing_wrappers::*,
};

/// Frame and scan parameters of a lossless stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lj92Header {
    pub precision: u8,
    /// Lines `Y` and samples per line `X`, per component.
    pub height: usize,
    pub width: usize,
    /// Component IDs in frame order. Decoded samples are interleaved in this order.
    pub component_ids: Vec<u8>,
    /// `Ss`, 0..=7. Predictor 0 predicts interior samples as zero.
    pub predictor: u8,
    /// `Al`: decoded samples are shifted left by this many bits.
    pub point_transform: u8,
}

impl Lj92Header {
    pub fn num_components(&self) -> usize {
        self.component_ids.len()
    }

    /// Samples in one decoded line, all components interleaved.
    pub fn samples_per_line(&self) -> usize {
        self.width * self.num_components()
    }

    pub fn num_samples(&self) -> usize {
        self.samples_per_line() * self.height
    }
}

struct FrameFields {
    precision: u8,
    height: usize,
    width: usize,
    component_ids: Vec<u8>,
}

fn read_frame(br: &mut ByteReader) -> Result<FrameFields> {
    let len = br.read_segment_length("SOF3")?;
    let precision = br.read_u8()?;
    let height = br.read_u16()? as usize;
    let width = br.read_u16()? as usize;
    let nf = br.read_u8()? as usize;
    if len != 6 + 3 * nf {
        return Err(Error::InvalidSegmentLength(len as u16 + 2, "SOF3"));
    }
    if !(2..=16).contains(&precision) {
        return Err(Error::InvalidPrecision(precision));
    }
    if !(1..=MAX_COMPONENTS).contains(&nf) {
        return Err(Error::InvalidComponentCount(nf));
    }
    if width == 0 || height == 0 {
        return Err(Error::InvalidImageSize(width, height));
    }
    let mut component_ids = Vec::with_capacity(nf);
    for _ in 0..nf {
        let id = br.read_u8()?;
        let (h, v) = br.read_nibbles()?;
        br.read_u8()?;
        if h != 1 || v != 1 {
            return Err(Error::InvalidSamplingFactors(h, v, id));
        }
        component_ids.push(id);
    }
    debug!(precision, width, height, nf, "lossless frame");
    Ok(FrameFields {
        precision,
        height,
        width,
        component_ids,
    })
}

#[inline(always)]
fn read_diff(br: &mut BitReader, table: &LookupTable) -> Result<i32> {
    Ok(match table.read_category(br)? {
        0 => 0,
        16 => 32768,
        cat => {
            let extra = br.peek_bits(cat as u32);
            br.consume(cat as u32)?;
            decode_coeff(cat, extra as u16)
        }
    })
}

#[inline(always)]
fn sample(prediction: i32, diff: i32) -> u16 {
    // Reconstruction is modulo 2^16.
    (prediction + diff) as u16
}

/// Decoder for a single lossless JPEG image.
pub struct Lj92Decoder<'a> {
    header: Lj92Header,
    /// Table and frame position of each scan component, in scan order.
    tables: Vec<LookupTable>,
    positions: Vec<usize>,
    ecs: &'a [u8],
    linearization: Option<&'a [u16]>,
}

impl<'a> Lj92Decoder<'a> {
    /// Parses the stream up to and including the scan header.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn new(data: &'a [u8]) -> Result<Lj92Decoder<'a>> {
        let mut reader = ByteReader::new(data);
        let b0 = reader.read_u8()?;
        let b1 = reader.read_u8()?;
        if [b0, b1] != markers::SOI.to_be_bytes() {
            return Err(Error::MissingSoi(b0, b1));
        }
        let mut frame = None;
        let mut specs: [Option<HuffmanSpec>; NUM_DESTINATIONS as usize] = Default::default();
        loop {
            let (marker, _) = reader.read_marker()?;
            trace!("marker 0x{marker:04x}");
            match marker {
                markers::SOF3 => frame = Some(read_frame(&mut reader)?),
                m if markers::is_sof(m) => {
                    return Err(Error::UnsupportedProcess(markers::process_name(m)));
                }
                markers::DHT => {
                    let len = reader.read_segment_length("DHT")?;
                    let end = reader.position() + len;
                    while reader.position() < end {
                        let (class, dest, spec) = HuffmanSpec::read(&mut reader)?;
                        if class == TableClass::Dc {
                            specs[dest as usize] = Some(spec);
                        } else {
                            warning!(dest, "ignoring AC table in lossless stream");
                        }
                    }
                }
                markers::DRI => {
                    let len = reader.read_segment_length("DRI")?;
                    if len != 2 {
                        return Err(Error::InvalidSegmentLength(len as u16 + 2, "DRI"));
                    }
                    if reader.read_u16()? != 0 {
                        return Err(Error::UnsupportedProcess(
                            "Restart intervals in lossless JPEG",
                        ));
                    }
                }
                markers::APP0..=markers::APP15 | markers::COM | markers::DAC => {
                    let len = reader.read_segment_length("APPn")?;
                    reader.skip(len)?;
                }
                markers::TEM => {}
                markers::SOS => {
                    let frame = frame.take().ok_or(Error::MissingFrameHeader)?;
                    return Self::read_scan(&mut reader, frame, &specs);
                }
                markers::EOI => return Err(Error::MissingFrameHeader),
                m => return Err(Error::UnsupportedMarker(m)),
            }
        }
    }

    fn read_scan(
        reader: &mut ByteReader<'a>,
        frame: FrameFields,
        specs: &[Option<HuffmanSpec>],
    ) -> Result<Lj92Decoder<'a>> {
        let len = reader.read_segment_length("SOS")?;
        let ns = reader.read_u8()? as usize;
        if len != 4 + 2 * ns {
            return Err(Error::InvalidSegmentLength(len as u16 + 2, "SOS"));
        }
        let nf = frame.component_ids.len();
        if ns != nf {
            return Err(Error::ComponentCountMismatch(nf, ns));
        }
        let mut tables = Vec::with_capacity(ns);
        let mut positions = Vec::with_capacity(ns);
        for _ in 0..ns {
            let id = reader.read_u8()?;
            let (td, _) = reader.read_nibbles()?;
            let position = frame
                .component_ids
                .iter()
                .position(|&c| c == id)
                .ok_or(Error::UnknownComponent(id))?;
            // Every frame component has to be coded exactly once.
            if positions.contains(&position) {
                return Err(Error::UnknownComponent(id));
            }
            let spec = specs
                .get(td as usize)
                .ok_or(Error::InvalidHuffmanTableIndex(td))?
                .as_ref()
                .ok_or(Error::MissingHuffmanTable(TableClass::Dc, td))?;
            tables.push(LookupTable::new(spec)?);
            positions.push(position);
        }
        let predictor = reader.read_u8()?;
        reader.read_u8()?;
        let (_, point_transform) = reader.read_nibbles()?;
        if predictor > 7 {
            return Err(Error::InvalidPredictor(predictor));
        }
        if point_transform >= frame.precision {
            return Err(Error::InvalidPointTransform(point_transform, frame.precision));
        }
        debug!(predictor, point_transform, "lossless scan");
        Ok(Lj92Decoder {
            header: Lj92Header {
                precision: frame.precision,
                height: frame.height,
                width: frame.width,
                component_ids: frame.component_ids,
                predictor,
                point_transform,
            },
            tables,
            positions,
            ecs: reader.rest(),
            linearization: None,
        })
    }

    pub fn header(&self) -> &Lj92Header {
        &self.header
    }

    /// Maps every decoded sample through `table`, which needs an entry for each value of the
    /// frame precision.
    pub fn set_linearization(&mut self, table: &'a [u16]) -> Result<()> {
        let needed = 1 << self.header.precision;
        if table.len() < needed {
            return Err(Error::InvalidLinearizationTable(table.len(), needed));
        }
        self.linearization = Some(table);
        Ok(())
    }

    /// Decodes the image into `out`, lines of [`Lj92Header::samples_per_line`] interleaved
    /// samples.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn decode(&self, out: &mut [u16]) -> Result<()> {
        let len = self.header.num_samples();
        if out.len() < len {
            return Err(Error::OutputTooSmall(len * 2, out.len() * 2));
        }
        let out = &mut out[..len];
        let mut br = BitReader::new(self.ecs);
        match (self.header.predictor, self.tables.len()) {
            (1, _) => self.decode_lines(&mut br, out, |ra, _, _| ra)?,
            (2, _) => self.decode_lines(&mut br, out, |_, rb, _| rb)?,
            (6, _) => self.decode_lines(&mut br, out, |ra, rb, rc| rb + ((ra - rc) >> 1))?,
            (7, 2) => self.decode_pairs_average(&mut br, out)?,
            _ => self.decode_generic(&mut br, out)?,
        }
        self.finish(out);
        Ok(())
    }

    fn decode_generic(&self, br: &mut BitReader, out: &mut [u16]) -> Result<()> {
        let predictor = self.header.predictor;
        self.decode_lines(br, out, |ra, rb, rc| predict(predictor, ra, rb, rc))
    }

    fn initial_prediction(&self) -> i32 {
        1 << (self.header.precision - self.header.point_transform - 1)
    }

    /// Decodes with the first line predicted from the left and the first column from above;
    /// `predict` receives the left, above and above-left samples.
    #[inline(always)]
    fn decode_lines(
        &self,
        br: &mut BitReader,
        out: &mut [u16],
        predict: impl Fn(i32, i32, i32) -> i32,
    ) -> Result<()> {
        let nc = self.tables.len();
        let line = self.header.samples_per_line();
        let (first, rest) = out.split_at_mut(line);
        for (table, &c) in self.tables.iter().zip(&self.positions) {
            first[c] = sample(self.initial_prediction(), read_diff(br, table)?);
        }
        for px in (nc..line).step_by(nc) {
            for (table, &c) in self.tables.iter().zip(&self.positions) {
                let i = px + c;
                first[i] = sample(first[i - nc] as i32, read_diff(br, table)?);
            }
        }
        let mut prev: &[u16] = first;
        for cur in rest.chunks_exact_mut(line) {
            for (table, &c) in self.tables.iter().zip(&self.positions) {
                cur[c] = sample(prev[c] as i32, read_diff(br, table)?);
            }
            for px in (nc..line).step_by(nc) {
                for (table, &c) in self.tables.iter().zip(&self.positions) {
                    let i = px + c;
                    let prediction = predict(cur[i - nc] as i32, prev[i] as i32, prev[i - nc] as i32);
                    cur[i] = sample(prediction, read_diff(br, table)?);
                }
            }
            prev = cur;
        }
        Ok(())
    }

    /// Two components with predictor 7, both residuals of a pixel decoded back to back.
    fn decode_pairs_average(&self, br: &mut BitReader, out: &mut [u16]) -> Result<()> {
        let ([t0, t1], &[c0, c1]) = (&self.tables[..], &self.positions[..]) else {
            return self.decode_generic(br, out);
        };
        let line = self.header.samples_per_line();
        let initial = self.initial_prediction();
        let (first, rest) = out.split_at_mut(line);
        first[c0] = sample(initial, read_diff(br, t0)?);
        first[c1] = sample(initial, read_diff(br, t1)?);
        for px in (2..line).step_by(2) {
            first[px + c0] = sample(first[px - 2 + c0] as i32, read_diff(br, t0)?);
            first[px + c1] = sample(first[px - 2 + c1] as i32, read_diff(br, t1)?);
        }
        let mut prev: &[u16] = first;
        for cur in rest.chunks_exact_mut(line) {
            cur[c0] = sample(prev[c0] as i32, read_diff(br, t0)?);
            cur[c1] = sample(prev[c1] as i32, read_diff(br, t1)?);
            for px in (2..line).step_by(2) {
                let (a, b) = (px + c0, px + c1);
                cur[a] = sample((cur[a - 2] as i32 + prev[a] as i32) >> 1, read_diff(br, t0)?);
                cur[b] = sample((cur[b - 2] as i32 + prev[b] as i32) >> 1, read_diff(br, t1)?);
            }
            prev = cur;
        }
        Ok(())
    }

    /// Undoes the point transform and applies the linearization table.
    fn finish(&self, out: &mut [u16]) {
        let pt = self.header.point_transform;
        match self.linearization {
            Some(table) => {
                let last = table.len() - 1;
                for s in out.iter_mut() {
                    let v = ((*s as u32) << pt) as u16;
                    *s = table[(v as usize).min(last)];
                }
            }
            None if pt > 0 => {
                for s in out.iter_mut() {
                    *s = ((*s as u32) << pt) as u16;
                }
            }
            None => {}
        }
    }
}
