// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Scans: macroblock order, DC prediction and restart handling.

use octopus_transforms::BLOCK_SIZE;

use crate::{
    bit_reader::{BitReader, Bits, ByteReader},
    bit_writer::{BitWriter, ByteWriter},
    coeffs::{CoeffBlock, count_block, read_block, write_block},
    context::{Context, NUM_HUFFMAN_TABLES},
    error::{Error, Result},
    huffman::{FrequencyModel, TableClass},
    markers,
    util::tracing_wrappers::*,
};

/// Most components a scan may interleave.
pub const MAX_SCAN_COMPONENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    pub id: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// One block of a macroblock: index into the scan components and block offset within the
/// component's part of the macroblock.
#[derive(Debug, Clone, Copy)]
struct BlockSlot {
    component: usize,
    dx: usize,
    dy: usize,
}

/// Receives the blocks of a scan being encoded, DC already differenced.
pub trait BlockSink {
    fn block(&mut self, component: &ScanComponent, block: &CoeffBlock) -> Result<()>;

    /// Called before the first macroblock of every restart interval but the first.
    fn restart(&mut self, index: usize) -> Result<()>;
}

#[derive(Debug)]
pub struct Scan {
    components: Vec<ScanComponent>,
    slots: Vec<BlockSlot>,
    /// Last DC value of each scan component.
    predictors: Vec<i32>,
    /// Macroblocks per row and total macroblocks of the scan.
    mcus_per_row: usize,
    num_mcus: usize,
    /// Next macroblock to be coded.
    mcu: usize,
    next_restart: usize,
}

impl Scan {
    /// Sets up a scan over `components`, which must be defined in the frame. A single component
    /// is scanned non-interleaved, over its own block grid.
    pub fn new(ctx: &Context, components: Vec<ScanComponent>) -> Result<Scan> {
        if components.is_empty() || components.len() > MAX_SCAN_COMPONENTS {
            return Err(Error::InvalidComponentCount(components.len()));
        }
        let mut slots = Vec::new();
        for (i, sc) in components.iter().enumerate() {
            let c = ctx
                .components
                .get(&sc.id)
                .ok_or(Error::UnknownComponent(sc.id))?;
            for table in [sc.dc_table, sc.ac_table] {
                if table as usize >= NUM_HUFFMAN_TABLES {
                    return Err(Error::InvalidHuffmanTableIndex(table));
                }
            }
            if components.len() == 1 {
                slots.push(BlockSlot {
                    component: i,
                    dx: 0,
                    dy: 0,
                });
            } else {
                for dy in 0..c.v as usize {
                    for dx in 0..c.h as usize {
                        slots.push(BlockSlot {
                            component: i,
                            dx,
                            dy,
                        });
                    }
                }
            }
        }

        let (mcus_per_row, num_mcus) = if components.len() == 1 {
            let c = &ctx.components[&components[0].id];
            let (cols, rows) = ctx.scan_blocks(c);
            (cols, cols * rows)
        } else {
            (ctx.mcus_x, ctx.num_mcus())
        };
        debug!(
            components = components.len(),
            blocks_per_mcu = slots.len(),
            mcus_per_row,
            num_mcus,
            "scan"
        );
        Ok(Scan {
            predictors: vec![0; components.len()],
            components,
            slots,
            mcus_per_row,
            num_mcus,
            mcu: 0,
            next_restart: 0,
        })
    }

    /// Parses an SOS header (B.2.3). Only sequential scans over the full spectrum are accepted.
    pub fn read(br: &mut ByteReader, ctx: &Context) -> Result<Scan> {
        let len = br.read_segment_length("SOS")?;
        if !ctx.frame_defined() {
            return Err(Error::ScanBeforeFrame);
        }
        let ns = br.read_u8()? as usize;
        if len != 4 + 2 * ns {
            return Err(Error::InvalidSegmentLength(len as u16 + 2, "SOS"));
        }
        let mut components = Vec::with_capacity(ns);
        for _ in 0..ns {
            let id = br.read_u8()?;
            let (dc_table, ac_table) = br.read_nibbles()?;
            components.push(ScanComponent {
                id,
                dc_table,
                ac_table,
            });
        }
        let ss = br.read_u8()?;
        let se = br.read_u8()?;
        let (ah, al) = br.read_nibbles()?;
        trace!(ss, se, ah, al, "spectral selection");
        if ss != 0 || se != 63 {
            return Err(Error::UnsupportedSpectralSelection(ss, se));
        }
        if ah != 0 || al != 0 {
            return Err(Error::UnsupportedSuccessiveApproximation(ah, al));
        }
        Scan::new(ctx, components)
    }

    pub fn write(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_segment_header(markers::SOS, 4 + 2 * self.components.len())?;
        w.write_u8(self.components.len() as u8)?;
        for sc in &self.components {
            w.write_u8(sc.id)?;
            w.write_nibbles(sc.dc_table, sc.ac_table)?;
        }
        w.write_u8(0)?;
        w.write_u8(63)?;
        w.write_nibbles(0, 0)
    }

    pub fn components(&self) -> &[ScanComponent] {
        &self.components
    }

    pub fn num_mcus(&self) -> usize {
        self.num_mcus
    }

    /// Number of macroblocks decoded so far.
    pub fn mcus_decoded(&self) -> usize {
        self.mcu
    }

    fn reset_predictors(&mut self) {
        self.predictors.fill(0);
    }

    /// Position of a macroblock slot within its component's block grid, or `None` for
    /// macroblocks past the end of the scan.
    fn block_index(&self, ctx: &Context, slot: BlockSlot, mcu: usize) -> Option<usize> {
        if mcu >= self.num_mcus {
            return None;
        }
        let c = ctx.components.get(&self.components[slot.component].id)?;
        let (mx, my) = (mcu % self.mcus_per_row, mcu / self.mcus_per_row);
        let (h, v) = if self.components.len() == 1 {
            (1, 1)
        } else {
            (c.h as usize, c.v as usize)
        };
        let bx = mx * h + slot.dx;
        let by = my * v + slot.dy;
        (bx < c.blocks_x && by < c.blocks_y).then_some(by * c.blocks_x + bx)
    }

    /// Handles an RSTn marker met in the entropy-coded data: DC prediction restarts and the
    /// macroblock counter moves to the start of the next interval.
    pub fn restart(&mut self, marker: u16, restart_interval: u16) {
        let index = (marker.wrapping_sub(markers::RST0) & 7) as usize;
        if index != self.next_restart % 8 {
            warning!(
                expected = self.next_restart % 8,
                found = index,
                "restart marker out of sequence"
            );
        }
        self.next_restart = index + 1;
        self.reset_predictors();
        if restart_interval > 0 {
            let ri = restart_interval as usize;
            self.mcu = self.mcu.div_ceil(ri) * ri;
        }
        trace!(mcu = self.mcu, "restart");
    }

    /// Decodes macroblocks until the entropy-coded segment ends at a marker.
    ///
    /// Blocks past the component grids are decoded and dropped so the stream stays in sync.
    /// A block interrupted by the marker is discarded.
    pub fn decode_segment(&mut self, br: &mut BitReader, ctx: &mut Context) -> Result<()> {
        let mut block = [0; BLOCK_SIZE];
        loop {
            for si in 0..self.slots.len() {
                let slot = self.slots[si];
                let sc = self.components[slot.component];
                let dc = ctx.huffman_table(TableClass::Dc, sc.dc_table)?;
                let ac = ctx.huffman_table(TableClass::Ac, sc.ac_table)?;
                if read_block(br, dc, ac, &mut block)? == Bits::Marker {
                    return Ok(());
                }
                let pred = &mut self.predictors[slot.component];
                block[0] = block[0].wrapping_add(*pred);
                *pred = block[0];
                if let Some(index) = self.block_index(ctx, slot, self.mcu)
                    && let Some(c) = ctx.components.get_mut(&sc.id)
                {
                    c.coeffs[index] = block;
                }
            }
            self.mcu += 1;
        }
    }

    /// Feeds every block of the scan to `sink`, with DC prediction and restart intervals.
    pub fn encode(
        &mut self,
        ctx: &Context,
        restart_interval: u16,
        sink: &mut impl BlockSink,
    ) -> Result<()> {
        self.reset_predictors();
        let ri = restart_interval as usize;
        for mcu in 0..self.num_mcus {
            if ri > 0 && mcu > 0 && mcu % ri == 0 {
                sink.restart(mcu / ri - 1)?;
                self.reset_predictors();
            }
            for &slot in &self.slots {
                let sc = &self.components[slot.component];
                let index = self
                    .block_index(ctx, slot, mcu)
                    .ok_or(Error::OutOfBounds)?;
                let mut block = ctx.components[&sc.id].coeffs[index];
                let pred = &mut self.predictors[slot.component];
                let dc = block[0];
                block[0] = dc - *pred;
                *pred = dc;
                sink.block(sc, &block)?;
            }
        }
        Ok(())
    }
}

/// Writes the entropy-coded segment of a scan.
pub struct EcsWriter<'a, 'b> {
    pub bw: BitWriter<'a>,
    pub ctx: &'b Context,
}

impl BlockSink for EcsWriter<'_, '_> {
    fn block(&mut self, component: &ScanComponent, block: &CoeffBlock) -> Result<()> {
        let dc = self.ctx.huffman_table(TableClass::Dc, component.dc_table)?;
        let ac = self.ctx.huffman_table(TableClass::Ac, component.ac_table)?;
        write_block(&mut self.bw, dc, ac, block)
    }

    fn restart(&mut self, index: usize) -> Result<()> {
        self.bw.write_marker(markers::rst(index))
    }
}

/// Collects symbol statistics of a scan for each table destination.
pub struct SymbolCounter {
    pub dc: [FrequencyModel; NUM_HUFFMAN_TABLES],
    pub ac: [FrequencyModel; NUM_HUFFMAN_TABLES],
}

impl Default for SymbolCounter {
    fn default() -> Self {
        SymbolCounter {
            dc: array_init::array_init(|_| FrequencyModel::new()),
            ac: array_init::array_init(|_| FrequencyModel::new()),
        }
    }
}

impl BlockSink for SymbolCounter {
    fn block(&mut self, component: &ScanComponent, block: &CoeffBlock) -> Result<()> {
        count_block(
            &mut self.dc[component.dc_table as usize],
            &mut self.ac[component.ac_table as usize],
            block,
        )
    }

    fn restart(&mut self, _index: usize) -> Result<()> {
        Ok(())
    }
}
