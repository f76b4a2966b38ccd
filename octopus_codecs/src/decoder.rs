// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Sequential (baseline and extended) JPEG decoding.

use crate::{
    bit_reader::{BitReader, ByteReader},
    context::{Component, Context},
    error::{Error, Result},
    frame::Frame,
    huffman::HuffmanSpec,
    markers,
    quant::QuantTable,
    scan::Scan,
    util::tracing_wrappers::*,
};

/// Frame header fields of an SOFn segment.
#[derive(Debug)]
pub struct FrameHeader {
    pub marker: u16,
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<Component>,
}

impl FrameHeader {
    pub fn read(br: &mut ByteReader, marker: u16) -> Result<FrameHeader> {
        let len = br.read_segment_length("SOF")?;
        let precision = br.read_u8()?;
        let height = br.read_u16()?;
        let width = br.read_u16()?;
        let nf = br.read_u8()? as usize;
        if len != 6 + 3 * nf {
            return Err(Error::InvalidSegmentLength(len as u16 + 2, "SOF"));
        }
        let mut components = Vec::with_capacity(nf);
        for _ in 0..nf {
            let id = br.read_u8()?;
            let (h, v) = br.read_nibbles()?;
            let tq = br.read_u8()?;
            components.push(Component::new(id, h, v, tq)?);
        }
        debug!(
            process = markers::process_name(marker),
            precision, width, height, nf, "frame header"
        );
        Ok(FrameHeader {
            marker,
            precision,
            height,
            width,
            components,
        })
    }
}

/// Returns the first start-of-frame marker of a codestream, skipping every other segment.
pub fn find_frame_marker(data: &[u8]) -> Result<u16> {
    let mut reader = ByteReader::new(data);
    expect_soi(&mut reader)?;
    loop {
        match reader.read_marker()?.0 {
            m if markers::is_sof(m) => return Ok(m),
            markers::SOS | markers::EOI => return Err(Error::NoFrame),
            markers::TEM | markers::RST0..=markers::RST7 => {}
            _ => {
                let len = reader.read_segment_length("marker")?;
                reader.skip(len)?;
            }
        }
    }
}

/// Returns whether the first frame of a codestream uses a DCT-based (lossy) process.
pub fn is_lossy(data: &[u8]) -> Result<bool> {
    find_frame_marker(data).map(markers::is_dct_sof)
}

fn expect_soi(reader: &mut ByteReader) -> Result<()> {
    let b0 = reader.read_u8()?;
    let b1 = reader.read_u8()?;
    if [b0, b1] != markers::SOI.to_be_bytes() {
        return Err(Error::MissingSoi(b0, b1));
    }
    Ok(())
}

/// Walks the markers of a sequential JPEG codestream, decoding scans into a [`Context`].
pub struct Decoder<'a> {
    reader: ByteReader<'a>,
    ctx: Context,
    scan: Option<Scan>,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Result<Decoder<'a>> {
        let mut reader = ByteReader::new(data);
        expect_soi(&mut reader)?;
        Ok(Decoder {
            reader,
            ctx: Context::new()?,
            scan: None,
        })
    }

    fn read_quant_tables(&mut self) -> Result<()> {
        let len = self.reader.read_segment_length("DQT")?;
        let end = self.reader.position() + len;
        while self.reader.position() < end {
            let (dest, table) = QuantTable::read(&mut self.reader)?;
            trace!(dest, precision = table.precision, "quantization table");
            self.ctx.qtables[dest as usize] = Some(table);
        }
        if self.reader.position() != end {
            return Err(Error::InvalidSegmentLength(len as u16 + 2, "DQT"));
        }
        Ok(())
    }

    fn read_huffman_tables(&mut self) -> Result<()> {
        let len = self.reader.read_segment_length("DHT")?;
        let end = self.reader.position() + len;
        while self.reader.position() < end {
            let (class, dest, spec) = HuffmanSpec::read(&mut self.reader)?;
            trace!(?class, dest, codes = spec.num_codes(), "Huffman table");
            self.ctx.set_huffman_table(class, dest, spec)?;
        }
        if self.reader.position() != end {
            return Err(Error::InvalidSegmentLength(len as u16 + 2, "DHT"));
        }
        Ok(())
    }

    fn read_restart_interval(&mut self) -> Result<()> {
        let len = self.reader.read_segment_length("DRI")?;
        if len != 2 {
            return Err(Error::InvalidSegmentLength(len as u16 + 2, "DRI"));
        }
        self.ctx.restart_interval = self.reader.read_u16()?;
        debug!(restart_interval = self.ctx.restart_interval, "restart interval");
        Ok(())
    }

    fn read_frame(&mut self, marker: u16) -> Result<()> {
        let header = FrameHeader::read(&mut self.reader, marker)?;
        if !matches!(marker, markers::SOF0 | markers::SOF1) {
            return Err(Error::UnsupportedProcess(markers::process_name(marker)));
        }
        self.scan = None;
        self.ctx.define_frame(
            header.precision,
            header.width as usize,
            header.height as usize,
            header.components,
        )
    }

    /// Decodes entropy-coded data from the current position up to the next marker.
    fn decode_ecs(&mut self) -> Result<()> {
        let Some(scan) = self.scan.as_mut() else {
            return Ok(());
        };
        let mut br = BitReader::new(self.reader.rest());
        scan.decode_segment(&mut br, &mut self.ctx)?;
        self.reader.advance(br.position());
        trace!(mcus = scan.mcus_decoded(), "entropy-coded segment");
        Ok(())
    }

    /// Decodes every marker segment up to EOI and returns the reconstructed image, converted
    /// to RGB when it has three or four components.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn decode(mut self) -> Result<Frame> {
        loop {
            let (marker, skipped) = self.reader.read_marker()?;
            if skipped > 0 {
                warning!(skipped, marker, "skipped bytes in front of marker");
            }
            trace!("marker 0x{marker:04x}");
            match marker {
                markers::APP0..=markers::APP15 | markers::COM | markers::DAC => {
                    let len = self.reader.read_segment_length("APPn")?;
                    self.reader.skip(len)?;
                }
                markers::DQT => self.read_quant_tables()?,
                markers::DHT => self.read_huffman_tables()?,
                markers::DRI => self.read_restart_interval()?,
                m if markers::is_sof(m) => self.read_frame(m)?,
                markers::SOS => {
                    self.scan = Some(Scan::read(&mut self.reader, &self.ctx)?);
                    self.decode_ecs()?;
                }
                markers::RST0..=markers::RST7 => match self.scan.as_mut() {
                    Some(scan) => {
                        scan.restart(marker, self.ctx.restart_interval);
                        self.decode_ecs()?;
                    }
                    None => {
                        warning!(marker, "restart marker outside of a scan");
                    }
                },
                markers::TEM => {}
                markers::EOI => break,
                m => return Err(Error::UnsupportedMarker(m)),
            }
        }
        if !self.ctx.frame_defined() {
            return Err(Error::NoFrame);
        }
        if self.reader.remaining() > 0 {
            warning!(bytes = self.reader.remaining(), "trailing data after EOI");
        }
        self.ctx.reconstruct()?;
        let mut frame = self.ctx.to_frame()?;
        frame.ycc_to_rgb();
        Ok(frame)
    }
}

/// Decodes a sequential JPEG codestream into a frame.
pub fn decode_jpeg(data: &[u8]) -> Result<Frame> {
    Decoder::new(data)?.decode()
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::{
        encoder::{EncoderOptions, encode_jpeg},
        error::ErrorKind,
        util::test::assert_all_almost_eq,
    };

    fn solid(width: usize, height: usize, rgb: [u8; 3]) -> Frame {
        let samples: Vec<u8> = rgb.iter().copied().cycle().take(width * height * 3).collect();
        Frame::from_samples(width, height, 3, 8, &samples).unwrap()
    }

    fn gradient(width: usize, height: usize) -> Frame {
        let mut samples = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                samples.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        Frame::from_samples(width, height, 3, 8, &samples).unwrap()
    }

    /// Grayscale blocks of increasing entropy: flat, noisy, then a ramp.
    fn busy_gray(width: usize) -> Frame {
        let mut samples = Vec::with_capacity(width * 8);
        for y in 0..8 {
            for x in 0..width {
                samples.push(match x {
                    0..8 => 100u8,
                    8..16 => ((x * 97 + y * 61) % 256) as u8,
                    _ => (x * 6 + y) as u8,
                });
            }
        }
        Frame::from_samples(width, 8, 1, 8, &samples).unwrap()
    }

    /// Returns the offset and total size of every segment with the given marker, up to and
    /// including the first SOS.
    fn segments(data: &[u8], marker: u16) -> Vec<(usize, usize)> {
        let mut found = Vec::new();
        let mut pos = 2;
        loop {
            let m = u16::from_be_bytes([data[pos], data[pos + 1]]);
            let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            if m == marker {
                found.push((pos, len + 2));
            }
            if m == markers::SOS {
                return found;
            }
            pos += len + 2;
        }
    }

    fn flat(frame: &Frame) -> Vec<f32> {
        frame
            .quantized_samples(frame.num_components())
            .iter()
            .map(|&s| s as f32)
            .collect()
    }

    #[test]
    fn solid_color_round_trip() -> Result<()> {
        let frame = solid(37, 21, [200, 100, 50]);
        let data = encode_jpeg(&frame, &EncoderOptions::default())?;
        let decoded = decode_jpeg(&data)?;
        assert_eq!((decoded.width(), decoded.height()), (37, 21));
        assert_eq!(decoded.num_components(), 3);
        assert_all_almost_eq!(flat(&decoded), flat(&frame), 3.0);
        Ok(())
    }

    #[test]
    fn subsampled_gradient_round_trip() -> Result<()> {
        let frame = gradient(48, 32);
        let options = EncoderOptions {
            luma_h: 2,
            luma_v: 2,
            quality: 90,
            ..Default::default()
        };
        let decoded = decode_jpeg(&encode_jpeg(&frame, &options)?)?;
        assert_all_almost_eq!(flat(&decoded), flat(&frame), 10.0);
        Ok(())
    }

    #[test]
    fn odd_sized_color_round_trips() -> Result<()> {
        for (luma_h, luma_v) in [(1, 1), (2, 1), (2, 2)] {
            let options = EncoderOptions {
                luma_h,
                luma_v,
                quality: 90,
                ..Default::default()
            };
            for (width, height) in [(13, 11), (37, 21)] {
                let frame = solid(width, height, [30, 160, 220]);
                let decoded = decode_jpeg(&encode_jpeg(&frame, &options)?)?;
                assert_eq!((decoded.width(), decoded.height()), (width, height));
                assert_all_almost_eq!(flat(&decoded), flat(&frame), 3.0);

                let frame = gradient(width, height);
                let decoded = decode_jpeg(&encode_jpeg(&frame, &options)?)?;
                assert_all_almost_eq!(flat(&decoded), flat(&frame), 10.0);
            }
        }
        Ok(())
    }

    #[test]
    fn twelve_bit_grayscale() -> Result<()> {
        let samples: Vec<u16> = (0..24 * 16).map(|i| ((i % 24) * 150 + (i / 24) * 7) as u16).collect();
        let frame = Frame::from_samples(24, 16, 1, 12, &samples)?;
        let options = EncoderOptions {
            quality: 100,
            ..Default::default()
        };
        let data = encode_jpeg(&frame, &options)?;
        assert_eq!(find_frame_marker(&data)?, markers::SOF1);
        let decoded = decode_jpeg(&data)?;
        assert_eq!(decoded.precision(), 12);
        assert_all_almost_eq!(flat(&decoded), flat(&frame), 8.0);
        Ok(())
    }

    #[test]
    fn restart_intervals_do_not_change_the_image() -> Result<()> {
        let frame = gradient(40, 24);
        for optimize in [false, true] {
            let plain = EncoderOptions {
                optimize,
                ..Default::default()
            };
            let restarted = EncoderOptions {
                restart_interval: 2,
                ..plain
            };
            let a = encode_jpeg(&frame, &plain)?;
            let b = encode_jpeg(&frame, &restarted)?;
            assert_eq!(segments(&b, markers::DRI).len(), 1);
            assert_eq!(decode_jpeg(&a)?, decode_jpeg(&b)?);
        }
        Ok(())
    }

    #[test]
    fn restart_marker_resynchronizes_truncated_interval() -> Result<()> {
        let frame = busy_gray(32);
        let options = EncoderOptions {
            restart_interval: 2,
            ..Default::default()
        };
        let data = encode_jpeg(&frame, &options)?;
        let reference = decode_jpeg(&data)?;

        // Cut the tail of the noisy second block out of the first interval.
        let (sos, sos_len) = segments(&data, markers::SOS)[0];
        let ecs = sos + sos_len;
        let rst0 = ecs
            + data[ecs..]
                .windows(2)
                .position(|w| w == markers::rst(0).to_be_bytes())
                .unwrap();
        let mut damaged = data[..rst0 - 2].to_vec();
        damaged.extend_from_slice(&data[rst0..]);

        let decoded = decode_jpeg(&damaged)?;
        for y in 0..8 {
            assert_eq!(decoded.row(y)[..8], reference.row(y)[..8]);
            assert_eq!(decoded.row(y)[16..32], reference.row(y)[16..32]);
        }
        Ok(())
    }

    #[test]
    fn decodes_streams_without_huffman_tables() -> Result<()> {
        let frame = gradient(16, 16);
        let options = EncoderOptions {
            optimize: false,
            ..Default::default()
        };
        let data = encode_jpeg(&frame, &options)?;
        let dht = segments(&data, markers::DHT);
        assert_eq!(dht.len(), 1);
        let (pos, len) = dht[0];
        let mut mjpeg = data[..pos].to_vec();
        mjpeg.extend_from_slice(&data[pos + len..]);
        assert_eq!(decode_jpeg(&mjpeg)?, decode_jpeg(&data)?);
        Ok(())
    }

    #[test]
    fn rejects_other_processes() {
        for (marker, name) in [
            (markers::SOF2, "Progressive DCT"),
            (markers::SOF3, "Lossless (sequential)"),
            (markers::SOF9, "Extended sequential DCT, arithmetic coding"),
        ] {
            let mut data = vec![0xff, 0xd8];
            data.extend_from_slice(&marker.to_be_bytes());
            data.extend_from_slice(&[0, 11, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
            data.extend_from_slice(&[0xff, 0xd9]);
            let err = decode_jpeg(&data).unwrap_err();
            assert!(matches!(err, Error::UnsupportedProcess(n) if n == name));
            assert_eq!(err.kind(), ErrorKind::NotImplemented);
            assert_eq!(is_lossy(&data).unwrap(), marker != markers::SOF3);
        }
    }

    #[test]
    fn malformed_streams() {
        assert!(matches!(
            decode_jpeg(&[0x00, 0x01, 0x02]),
            Err(Error::MissingSoi(0x00, 0x01))
        ));
        assert!(matches!(
            decode_jpeg(&[0xff, 0xd8, 0xff, 0xd9]),
            Err(Error::NoFrame)
        ));
        assert!(matches!(
            decode_jpeg(&[0xff, 0xd8, 0xff, 0xc8, 0xff, 0xd9]),
            Err(Error::UnsupportedMarker(0xffc8))
        ));
        assert!(matches!(
            decode_jpeg(&[0xff, 0xd8, 0xff, 0xdb, 0x00, 0x10, 0x00]),
            Err(Error::InvalidSegmentLength(16, "DQT"))
        ));
        assert!(matches!(
            decode_jpeg(&[0xff, 0xd8, 0xff, 0xda, 0x00, 0x08, 1, 1, 0, 0, 63, 0]),
            Err(Error::ScanBeforeFrame)
        ));
        assert!(matches!(is_lossy(&[0xff, 0xd8, 0xff, 0xd9]), Err(Error::NoFrame)));
    }

    #[test]
    fn truncated_stream_fails() -> Result<()> {
        let data = encode_jpeg(&gradient(16, 16), &EncoderOptions::default())?;
        let truncated = &data[..data.len() - 3];
        assert!(matches!(decode_jpeg(truncated), Err(Error::OutOfBounds)));
        Ok(())
    }

    #[test]
    fn skips_application_segments() -> Result<()> {
        let frame = solid(8, 8, [10, 20, 30]);
        let data = encode_jpeg(&frame, &EncoderOptions::default())?;
        let mut with_app = data[..2].to_vec();
        with_app.extend_from_slice(&[0xff, 0xe1, 0x00, 0x06, b'E', b'x', b'i', b'f']);
        with_app.extend_from_slice(&[0xff, 0xfe, 0x00, 0x03, b'!']);
        with_app.extend_from_slice(&data[2..]);
        assert_eq!(decode_jpeg(&with_app)?, decode_jpeg(&data)?);
        Ok(())
    }
}
