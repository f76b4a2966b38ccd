// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Sequential JPEG encoding.

use crate::{
    bit_writer::ByteWriter,
    context::{Component, Context},
    error::{Error, Result},
    frame::Frame,
    huffman::TableClass,
    markers,
    quant::QuantTable,
    scan::{EcsWriter, Scan, ScanComponent, SymbolCounter},
    util::tracing_wrappers::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Luma sampling factors. Chroma is always sampled 1x1; grayscale ignores these.
    pub luma_h: u8,
    pub luma_v: u8,
    /// 1..=100, scaling the Annex K quantization tables.
    pub quality: u32,
    /// Derive Huffman tables from the image statistics instead of using the Annex K tables.
    pub optimize: bool,
    /// Macroblocks per restart interval; 0 writes no restart markers.
    pub restart_interval: u16,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            luma_h: 2,
            luma_v: 1,
            quality: 75,
            optimize: true,
            restart_interval: 0,
        }
    }
}

fn write_quant_tables(w: &mut ByteWriter, ctx: &Context) -> Result<()> {
    let tables: Vec<_> = ctx
        .qtables
        .iter()
        .enumerate()
        .filter_map(|(dest, t)| Some((dest as u8, t.as_ref()?)))
        .collect();
    let len = tables.iter().map(|(_, t)| t.encoded_len()).sum();
    w.write_segment_header(markers::DQT, len)?;
    for (dest, table) in tables {
        table.write(w, dest)?;
    }
    Ok(())
}

fn write_frame_header(w: &mut ByteWriter, ctx: &Context) -> Result<()> {
    let marker = if ctx.precision == 8 {
        markers::SOF0
    } else {
        markers::SOF1
    };
    w.write_segment_header(marker, 6 + 3 * ctx.components.len())?;
    w.write_u8(ctx.precision)?;
    w.write_u16(ctx.height as u16)?;
    w.write_u16(ctx.width as u16)?;
    w.write_u8(ctx.components.len() as u8)?;
    for c in ctx.components.values() {
        w.write_u8(c.id)?;
        w.write_nibbles(c.h, c.v)?;
        w.write_u8(c.tq)?;
    }
    Ok(())
}

fn write_huffman_tables(w: &mut ByteWriter, ctx: &Context, num_tables: u8) -> Result<()> {
    let mut tables = Vec::new();
    for class in [TableClass::Dc, TableClass::Ac] {
        for dest in 0..num_tables {
            tables.push((class, dest, ctx.huffman_table(class, dest)?.spec()));
        }
    }
    let len = tables.iter().map(|(_, _, spec)| 1 + spec.encoded_len()).sum();
    w.write_segment_header(markers::DHT, len)?;
    for (class, dest, spec) in tables {
        spec.write(w, class, dest)?;
    }
    Ok(())
}

/// Replaces the tables used by `scan` with ones fitted to its symbol statistics.
fn optimize_tables(ctx: &mut Context, scan: &mut Scan, num_tables: u8) -> Result<()> {
    let mut counter = SymbolCounter::default();
    scan.encode(ctx, ctx.restart_interval, &mut counter)?;
    for dest in 0..num_tables {
        let models = [
            (TableClass::Dc, &counter.dc[dest as usize]),
            (TableClass::Ac, &counter.ac[dest as usize]),
        ];
        for (class, model) in models {
            if let Some(spec) = model.build_spec()? {
                trace!(?class, dest, codes = spec.num_codes(), "optimized table");
                ctx.set_huffman_table(class, dest, spec)?;
            }
        }
    }
    Ok(())
}

/// Encodes a grayscale or RGB frame as a sequential JPEG codestream. RGB is converted to
/// YCbCr; 12-bit frames produce an extended (SOF1) stream.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(frame)))]
pub fn encode_jpeg(frame: &Frame, options: &EncoderOptions) -> Result<Vec<u8>> {
    let nf = frame.num_components();
    if nf != 1 && nf != 3 {
        return Err(Error::InvalidComponentCount(nf));
    }
    if frame.width() > u16::MAX as usize || frame.height() > u16::MAX as usize {
        return Err(Error::InvalidImageSize(frame.width(), frame.height()));
    }
    let (luma_h, luma_v) = if nf == 1 {
        (1, 1)
    } else {
        (options.luma_h, options.luma_v)
    };

    let mut components = vec![Component::new(1, luma_h, luma_v, 0)?];
    for id in 2..=nf as u8 {
        components.push(Component::new(id, 1, 1, 1)?);
    }
    let mut ctx = Context::new()?;
    ctx.define_frame(frame.precision(), frame.width(), frame.height(), components)?;
    ctx.restart_interval = options.restart_interval;
    ctx.qtables[0] = Some(QuantTable::luminance(options.quality));
    if nf > 1 {
        ctx.qtables[1] = Some(QuantTable::chrominance(options.quality));
    }

    let mut padded = frame.repadded(8 * luma_h as usize, 8 * luma_v as usize)?;
    padded.rgb_to_ycc();
    ctx.load_frame(&padded)?;
    ctx.compress()?;

    let scan_components = ctx
        .components
        .values()
        .map(|c| ScanComponent {
            id: c.id,
            dc_table: c.tq,
            ac_table: c.tq,
        })
        .collect();
    let mut scan = Scan::new(&ctx, scan_components)?;
    let num_tables = if nf == 1 { 1 } else { 2 };
    if options.optimize {
        optimize_tables(&mut ctx, &mut scan, num_tables)?;
    }

    let mut out = Vec::new();
    let mut w = ByteWriter::new(&mut out);
    w.write_marker(markers::SOI)?;
    write_quant_tables(&mut w, &ctx)?;
    write_frame_header(&mut w, &ctx)?;
    write_huffman_tables(&mut w, &ctx, num_tables)?;
    if ctx.restart_interval > 0 {
        w.write_segment_header(markers::DRI, 2)?;
        w.write_u16(ctx.restart_interval)?;
    }
    scan.write(&mut w)?;
    let mut ecs = EcsWriter {
        bw: w.bit_writer(),
        ctx: &ctx,
    };
    scan.encode(&ctx, ctx.restart_interval, &mut ecs)?;
    ecs.bw.write_marker(markers::EOI)?;
    debug!(bytes = out.len(), "encoded");
    Ok(out)
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::{
        bit_reader::ByteReader,
        decoder::{FrameHeader, find_frame_marker},
    };

    fn header(data: &[u8]) -> FrameHeader {
        let marker = find_frame_marker(data).unwrap();
        let pos = data
            .windows(2)
            .position(|w| w == marker.to_be_bytes())
            .unwrap();
        FrameHeader::read(&mut ByteReader::new(&data[pos + 2..]), marker).unwrap()
    }

    #[test]
    fn frame_header_fields() -> Result<()> {
        let frame = Frame::new(21, 13, 3, 8)?;
        let data = encode_jpeg(&frame, &EncoderOptions::default())?;
        assert_eq!(&data[..2], &markers::SOI.to_be_bytes());
        assert_eq!(&data[data.len() - 2..], &markers::EOI.to_be_bytes());
        let h = header(&data);
        assert_eq!(h.marker, markers::SOF0);
        assert_eq!((h.width, h.height, h.precision), (21, 13, 8));
        let sampling: Vec<_> = h.components.iter().map(|c| (c.id, c.h, c.v, c.tq)).collect();
        assert_eq!(sampling, [(1, 2, 1, 0), (2, 1, 1, 1), (3, 1, 1, 1)]);
        Ok(())
    }

    #[test]
    fn grayscale_ignores_luma_sampling() -> Result<()> {
        let frame = Frame::new(9, 9, 1, 8)?;
        let options = EncoderOptions {
            luma_h: 2,
            luma_v: 2,
            ..Default::default()
        };
        let h = header(&encode_jpeg(&frame, &options)?);
        assert_eq!(h.components.len(), 1);
        assert_eq!((h.components[0].h, h.components[0].v), (1, 1));
        Ok(())
    }

    #[test]
    fn lower_quality_is_smaller() -> Result<()> {
        let samples: Vec<u8> = (0..64 * 64 * 3).map(|i| ((i * 7919) % 251) as u8).collect();
        let frame = Frame::from_samples(64, 64, 3, 8, &samples)?;
        let size = |quality| {
            let options = EncoderOptions {
                quality,
                ..Default::default()
            };
            encode_jpeg(&frame, &options).map(|d| d.len())
        };
        assert!(size(20)? < size(90)?);
        Ok(())
    }

    #[test]
    fn optimized_tables_are_not_larger() -> Result<()> {
        let samples: Vec<u8> = (0..32 * 32).map(|i| ((i % 32) * 8) as u8).collect();
        let frame = Frame::from_samples(32, 32, 1, 8, &samples)?;
        let standard = EncoderOptions {
            optimize: false,
            ..Default::default()
        };
        let optimized = encode_jpeg(&frame, &EncoderOptions::default())?;
        assert!(optimized.len() <= encode_jpeg(&frame, &standard)?.len());
        Ok(())
    }

    #[test]
    fn rejects_unsupported_frames() -> Result<()> {
        let two = Frame::new(8, 8, 2, 8)?;
        assert!(matches!(
            encode_jpeg(&two, &EncoderOptions::default()),
            Err(Error::InvalidComponentCount(2))
        ));
        let ten_bit = Frame::new(8, 8, 1, 10)?;
        assert!(matches!(
            encode_jpeg(&ten_bit, &EncoderOptions::default()),
            Err(Error::InvalidPrecision(10))
        ));
        let bad_sampling = EncoderOptions {
            luma_h: 5,
            ..Default::default()
        };
        assert!(matches!(
            encode_jpeg(&Frame::new(8, 8, 3, 8)?, &bad_sampling),
            Err(Error::InvalidSamplingFactors(5, 1, 1))
        ));
        Ok(())
    }
}
