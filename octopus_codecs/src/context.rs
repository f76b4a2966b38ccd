// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Per-image state shared by the sequential JPEG decoder and encoder.

use std::collections::BTreeMap;

use octopus_transforms::{BLOCK_DIM, BLOCK_SIZE, level_shift};

use crate::{
    coeffs::CoeffBlock,
    error::{Error, Result},
    frame::{Frame, MAX_FRAME_COMPONENTS},
    huffman::{HuffmanSpec, HuffmanTable, TableClass, standard},
    quant::{NUM_QUANT_TABLES, QuantTable},
    util::{checked_area, new_filled_vec, new_zeroed_vec, tracing_wrappers::*},
};

/// Number of Huffman table destinations per class.
pub const NUM_HUFFMAN_TABLES: usize = 4;

/// Largest sampling factor a frame header may carry.
pub const MAX_SAMPLING_FACTOR: u8 = 4;

/// A frame component: sampling factors, table selectors and its block-native buffers.
#[derive(Debug, Clone)]
pub struct Component {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    /// Quantization table selector.
    pub tq: u8,
    /// Block grid dimensions, covering whole macroblocks.
    pub blocks_x: usize,
    pub blocks_y: usize,
    /// Quantized coefficients, `blocks_x * blocks_y` blocks in raster order.
    pub coeffs: Vec<CoeffBlock>,
    /// Samples, `blocks_x * 8` wide and `blocks_y * 8` high.
    pub raster: Vec<f32>,
}

impl Component {
    pub fn new(id: u8, h: u8, v: u8, tq: u8) -> Result<Component> {
        if !(1..=MAX_SAMPLING_FACTOR).contains(&h) || !(1..=MAX_SAMPLING_FACTOR).contains(&v) {
            return Err(Error::InvalidSamplingFactors(h, v, id));
        }
        if tq as usize >= NUM_QUANT_TABLES {
            return Err(Error::InvalidQuantTableIndex(tq));
        }
        Ok(Component {
            id,
            h,
            v,
            tq,
            blocks_x: 0,
            blocks_y: 0,
            coeffs: Vec::new(),
            raster: Vec::new(),
        })
    }

    pub fn raster_width(&self) -> usize {
        self.blocks_x * BLOCK_DIM
    }

    pub fn raster_height(&self) -> usize {
        self.blocks_y * BLOCK_DIM
    }

    /// Copies the samples of block `(bx, by)` out of the raster.
    fn load_block(&self, bx: usize, by: usize) -> [f32; BLOCK_SIZE] {
        let stride = self.raster_width();
        let mut block = [0.0; BLOCK_SIZE];
        for (v, row) in block.chunks_exact_mut(BLOCK_DIM).enumerate() {
            let start = (by * BLOCK_DIM + v) * stride + bx * BLOCK_DIM;
            row.copy_from_slice(&self.raster[start..start + BLOCK_DIM]);
        }
        block
    }

    fn store_block(&mut self, bx: usize, by: usize, block: &[f32; BLOCK_SIZE]) {
        let stride = self.raster_width();
        for (v, row) in block.chunks_exact(BLOCK_DIM).enumerate() {
            let start = (by * BLOCK_DIM + v) * stride + bx * BLOCK_DIM;
            self.raster[start..start + BLOCK_DIM].copy_from_slice(row);
        }
    }
}

/// Image-level state: frame header fields, components keyed by ID, and table destinations.
#[derive(Debug)]
pub struct Context {
    /// Sample precision `P`.
    pub precision: u8,
    /// Number of lines `Y` and samples per line `X`.
    pub height: usize,
    pub width: usize,
    pub components: BTreeMap<u8, Component>,
    pub qtables: [Option<QuantTable>; NUM_QUANT_TABLES],
    huffman: [[Option<HuffmanTable>; NUM_HUFFMAN_TABLES]; 2],
    /// Restart interval `Ri` in macroblocks; 0 disables restarts.
    pub restart_interval: u16,
    pub max_h: u8,
    pub max_v: u8,
    /// Macroblock grid dimensions.
    pub mcus_x: usize,
    pub mcus_y: usize,
}

impl Context {
    /// Creates an empty context with the Annex K.3 tables installed as DC0/DC1/AC0/AC1.
    pub fn new() -> Result<Context> {
        let mut context = Context {
            precision: 8,
            height: 0,
            width: 0,
            components: BTreeMap::new(),
            qtables: Default::default(),
            huffman: Default::default(),
            restart_interval: 0,
            max_h: 1,
            max_v: 1,
            mcus_x: 0,
            mcus_y: 0,
        };
        context.set_huffman_table(TableClass::Dc, 0, standard::dc_luminance())?;
        context.set_huffman_table(TableClass::Dc, 1, standard::dc_chrominance())?;
        context.set_huffman_table(TableClass::Ac, 0, standard::ac_luminance())?;
        context.set_huffman_table(TableClass::Ac, 1, standard::ac_chrominance())?;
        Ok(context)
    }

    pub fn set_huffman_table(&mut self, class: TableClass, dest: u8, spec: HuffmanSpec) -> Result<()> {
        if dest as usize >= NUM_HUFFMAN_TABLES {
            return Err(Error::InvalidHuffmanTableIndex(dest));
        }
        self.huffman[class as usize][dest as usize] = Some(HuffmanTable::new(spec)?);
        Ok(())
    }

    pub fn huffman_table(&self, class: TableClass, dest: u8) -> Result<&HuffmanTable> {
        self.huffman
            .get(class as usize)
            .and_then(|tables| tables.get(dest as usize))
            .and_then(Option::as_ref)
            .ok_or(Error::MissingHuffmanTable(class, dest))
    }

    pub fn quant_table(&self, dest: u8) -> Result<&QuantTable> {
        self.qtables
            .get(dest as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidQuantTableIndex(dest))
    }

    pub fn frame_defined(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn num_mcus(&self) -> usize {
        self.mcus_x * self.mcus_y
    }

    /// Installs a frame header, replacing any previous components and their buffers.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, components)))]
    pub fn define_frame(
        &mut self,
        precision: u8,
        width: usize,
        height: usize,
        components: Vec<Component>,
    ) -> Result<()> {
        if precision != 8 && precision != 12 {
            return Err(Error::InvalidPrecision(precision));
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidImageSize(width, height));
        }
        let count = components.len();
        if !(1..=MAX_FRAME_COMPONENTS).contains(&count) {
            return Err(Error::InvalidComponentCount(count));
        }
        let mut map = BTreeMap::new();
        for c in components {
            if map.insert(c.id, c).is_some() {
                return Err(Error::InvalidComponentCount(count));
            }
        }

        self.precision = precision;
        self.width = width;
        self.height = height;
        self.max_h = map.values().map(|c| c.h).max().unwrap_or(1);
        self.max_v = map.values().map(|c| c.v).max().unwrap_or(1);
        self.mcus_x = width.div_ceil(BLOCK_DIM * self.max_h as usize);
        self.mcus_y = height.div_ceil(BLOCK_DIM * self.max_v as usize);

        for c in map.values_mut() {
            c.blocks_x = self.mcus_x * c.h as usize;
            c.blocks_y = self.mcus_y * c.v as usize;
            let blocks = checked_area(c.blocks_x, c.blocks_y)?;
            c.coeffs = new_filled_vec(blocks, [0; BLOCK_SIZE])?;
            c.raster = new_zeroed_vec(
                blocks
                    .checked_mul(BLOCK_SIZE)
                    .ok_or(Error::InvalidImageSize(width, height))?,
            )?;
            debug!(
                id = c.id,
                h = c.h,
                v = c.v,
                tq = c.tq,
                blocks_x = c.blocks_x,
                blocks_y = c.blocks_y,
                "component"
            );
        }
        self.components = map;
        Ok(())
    }

    /// Block grid of a non-interleaved scan of `component`: only blocks that contain image
    /// samples (ITU T.81 A.2.2).
    pub fn scan_blocks(&self, component: &Component) -> (usize, usize) {
        let cols = (self.width * component.h as usize).div_ceil(self.max_h as usize);
        let rows = (self.height * component.v as usize).div_ceil(self.max_v as usize);
        (cols.div_ceil(BLOCK_DIM), rows.div_ceil(BLOCK_DIM))
    }

    /// Dequantizes and inverse transforms every component into its raster.
    pub fn reconstruct(&mut self) -> Result<()> {
        let shift = level_shift(self.precision);
        let Context {
            components,
            qtables,
            ..
        } = self;
        for c in components.values_mut() {
            let qtable = qtables
                .get(c.tq as usize)
                .and_then(Option::as_ref)
                .ok_or(Error::InvalidQuantTableIndex(c.tq))?;
            for by in 0..c.blocks_y {
                for bx in 0..c.blocks_x {
                    let samples = qtable.reconstruct(&c.coeffs[by * c.blocks_x + bx], shift);
                    c.store_block(bx, by, &samples);
                }
            }
        }
        Ok(())
    }

    /// Forward transforms and quantizes every component raster into coefficients.
    pub fn compress(&mut self) -> Result<()> {
        let shift = level_shift(self.precision);
        let Context {
            components,
            qtables,
            ..
        } = self;
        for c in components.values_mut() {
            let qtable = qtables
                .get(c.tq as usize)
                .and_then(Option::as_ref)
                .ok_or(Error::InvalidQuantTableIndex(c.tq))?;
            for by in 0..c.blocks_y {
                for bx in 0..c.blocks_x {
                    let block = c.load_block(bx, by);
                    c.coeffs[by * c.blocks_x + bx] = qtable.compress(&block, shift);
                }
            }
        }
        Ok(())
    }

    /// Upsamples the component rasters into a frame, components in ascending ID order.
    pub fn to_frame(&self) -> Result<Frame> {
        let mut frame = Frame::with_padding(
            self.width,
            self.height,
            self.components.len(),
            self.precision,
            BLOCK_DIM * self.max_h as usize,
            BLOCK_DIM * self.max_v as usize,
        )?;
        let (size_x, size_y) = (frame.padded_width(), frame.padded_height());
        for (ci, c) in self.components.values().enumerate() {
            let (cw, ch) = (c.raster_width(), c.raster_height());
            for fy in 0..size_y {
                let src = &c.raster[(fy * ch / size_y) * cw..][..cw];
                for fx in 0..size_x {
                    frame.set_sample(fx, fy, ci, src[fx * cw / size_x]);
                }
            }
        }
        Ok(frame)
    }

    /// Box-filters a frame padded to whole macroblocks down into the component rasters.
    pub fn load_frame(&mut self, frame: &Frame) -> Result<()> {
        let (size_x, size_y) = (frame.padded_width(), frame.padded_height());
        let expected = (
            self.mcus_x * BLOCK_DIM * self.max_h as usize,
            self.mcus_y * BLOCK_DIM * self.max_v as usize,
        );
        if (size_x, size_y) != expected || frame.num_components() != self.components.len() {
            return Err(Error::InvalidImageSize(size_x, size_y));
        }
        for (ci, c) in self.components.values_mut().enumerate() {
            let (cw, ch) = (c.raster_width(), c.raster_height());
            let mut weights = new_zeroed_vec::<u32>(cw * ch)?;
            c.raster.fill(0.0);
            for fy in 0..size_y {
                let row = (fy * ch / size_y) * cw;
                for fx in 0..size_x {
                    let i = row + fx * cw / size_x;
                    c.raster[i] += frame.sample(fx, fy, ci);
                    weights[i] += 1;
                }
            }
            for (s, &w) in c.raster.iter_mut().zip(&weights) {
                *s /= w.max(1) as f32;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::util::test::assert_almost_eq;

    fn context(components: &[(u8, u8, u8)], width: usize, height: usize) -> Context {
        let mut ctx = Context::new().unwrap();
        let components = components
            .iter()
            .map(|&(id, h, v)| Component::new(id, h, v, 0).unwrap())
            .collect();
        ctx.define_frame(8, width, height, components).unwrap();
        ctx
    }

    #[test]
    fn geometry_420() {
        let ctx = context(&[(1, 2, 2), (2, 1, 1), (3, 1, 1)], 33, 17);
        assert_eq!((ctx.mcus_x, ctx.mcus_y), (3, 2));
        let y = &ctx.components[&1];
        assert_eq!((y.blocks_x, y.blocks_y), (6, 4));
        assert_eq!(y.coeffs.len(), 24);
        let cb = &ctx.components[&2];
        assert_eq!((cb.blocks_x, cb.blocks_y), (3, 2));
        assert_eq!(cb.raster.len(), 3 * 2 * 64);
        // Non-interleaved scans cover only blocks with image samples.
        assert_eq!(ctx.scan_blocks(y), (5, 3));
        assert_eq!(ctx.scan_blocks(cb), (3, 2));
    }

    #[test]
    fn rejects_bad_frames() {
        let mut ctx = Context::new().unwrap();
        assert!(matches!(
            Component::new(1, 0, 1, 0),
            Err(Error::InvalidSamplingFactors(0, 1, 1))
        ));
        assert!(matches!(
            Component::new(1, 1, 1, 4),
            Err(Error::InvalidQuantTableIndex(4))
        ));
        let c = || vec![Component::new(1, 1, 1, 0).unwrap()];
        assert!(matches!(
            ctx.define_frame(10, 8, 8, c()),
            Err(Error::InvalidPrecision(10))
        ));
        assert!(matches!(
            ctx.define_frame(8, 0, 8, c()),
            Err(Error::InvalidImageSize(0, 8))
        ));
        let twice = vec![
            Component::new(1, 1, 1, 0).unwrap(),
            Component::new(1, 1, 1, 0).unwrap(),
        ];
        assert!(matches!(
            ctx.define_frame(8, 8, 8, twice),
            Err(Error::InvalidComponentCount(2))
        ));
    }

    #[test]
    fn standard_tables_are_preinstalled() {
        let ctx = Context::new().unwrap();
        for dest in 0..2 {
            assert!(ctx.huffman_table(TableClass::Dc, dest).is_ok());
            assert!(ctx.huffman_table(TableClass::Ac, dest).is_ok());
        }
        assert!(matches!(
            ctx.huffman_table(TableClass::Ac, 2),
            Err(Error::MissingHuffmanTable(TableClass::Ac, 2))
        ));
    }

    #[test]
    fn subsampled_round_trip_through_rasters() -> Result<()> {
        let mut ctx = context(&[(1, 2, 1), (2, 1, 1)], 16, 8);
        let mut frame = Frame::with_padding(16, 8, 2, 8, 16, 8)?;
        for y in 0..8 {
            for x in 0..16 {
                frame.set_sample(x, y, 0, (x * 10 + y) as f32);
                // Pairs of equal chroma samples survive 2:1 averaging.
                frame.set_sample(x, y, 1, (x / 2 * 7) as f32);
            }
        }
        ctx.load_frame(&frame)?;
        assert_almost_eq!(ctx.components[&2].raster[3], 21.0, 1e-6);
        let back = ctx.to_frame()?;
        assert_eq!(back, frame);
        Ok(())
    }

    #[test]
    fn transform_round_trip_at_full_quality() -> Result<()> {
        let mut ctx = context(&[(1, 1, 1)], 8, 8);
        ctx.qtables[0] = Some(QuantTable::luminance(100));
        let c = ctx.components.get_mut(&1).unwrap();
        for (i, s) in c.raster.iter_mut().enumerate() {
            *s = (i * 3 % 256) as f32;
        }
        let original = c.raster.clone();
        ctx.compress()?;
        ctx.reconstruct()?;
        for (&a, &b) in ctx.components[&1].raster.iter().zip(&original) {
            assert_almost_eq!(a, b, 4.0);
        }
        Ok(())
    }
}
