// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Entry points for decoders embedded in a raw container.
//!
//! Input and output are byte buffers addressed at caller-chosen offsets. Every call returns an
//! [`ErrorKind`] and writes 16-bit little-endian samples into a buffer the caller allocated.

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    decoder::{decode_jpeg, is_lossy},
    error::{Error, ErrorKind, Result},
    lj92::Lj92Decoder,
    unpack::unpack_to_16,
    util::{new_zeroed_vec, tracing_wrappers::*},
};

fn input_at(input: &[u8], offset: usize) -> Result<&[u8]> {
    input.get(offset..).ok_or(Error::OutOfBounds)
}

fn output_at(out: &mut [u8], offset: usize, num_samples: usize) -> Result<&mut [u8]> {
    let available = out.len().saturating_sub(offset);
    let needed = num_samples.checked_mul(2).ok_or(Error::ArithmeticOverflow)?;
    if needed > available {
        return Err(Error::OutputTooSmall(needed, available));
    }
    Ok(&mut out[offset..offset + needed])
}

fn check_bit_depth(decoded: u8, expected: u32) -> Result<()> {
    if decoded as u32 != expected {
        return Err(Error::BitDepthMismatch(decoded, expected));
    }
    Ok(())
}

fn decode_lj92_at(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    width: usize,
    height: usize,
    bit_depth: u32,
    linearization: Option<&[u16]>,
) -> Result<()> {
    let mut decoder = Lj92Decoder::new(input_at(input, in_offset)?)?;
    if let Some(table) = linearization {
        decoder.set_linearization(table)?;
    }
    let header = decoder.header();
    // Encoders may reshape the raster, so only the sample count has to agree.
    let expected = width.checked_mul(height).ok_or(Error::ArithmeticOverflow)?;
    if header.num_samples() != expected {
        warning!(expected, decoded = header.num_samples(), "sample count mismatch");
        return Err(Error::PixelCountMismatch(
            header.samples_per_line(),
            header.height,
            header.num_samples(),
            width,
            height,
            expected,
        ));
    }
    check_bit_depth(header.precision, bit_depth)?;
    let dst = output_at(out, out_offset, expected)?;
    let mut samples = new_zeroed_vec(expected)?;
    decoder.decode(&mut samples)?;
    LittleEndian::write_u16_into(&samples, dst);
    Ok(())
}

/// Decodes a lossless JPEG image of `width * height` samples and `bit_depth` bits into
/// `out[out_offset..]`.
///
/// The decoded raster may have a different shape than `width` by `height` as long as it holds
/// the same number of samples.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(out, input)))]
pub fn lj92_decode(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    width: usize,
    height: usize,
    bit_depth: u32,
) -> ErrorKind {
    decode_lj92_at(out, out_offset, input, in_offset, width, height, bit_depth, None).into()
}

/// Like [`lj92_decode`], mapping every sample through `linearization`.
pub fn lj92_decode_linearized(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    width: usize,
    height: usize,
    bit_depth: u32,
    linearization: &[u16],
) -> ErrorKind {
    decode_lj92_at(
        out,
        out_offset,
        input,
        in_offset,
        width,
        height,
        bit_depth,
        Some(linearization),
    )
    .into()
}

/// Reports whether the codestream at `input[in_offset..]` holds a DCT-based frame.
pub fn jpeg_is_lossy(input: &[u8], in_offset: usize) -> std::result::Result<bool, ErrorKind> {
    input_at(input, in_offset)
        .and_then(is_lossy)
        .map_err(|err| err.kind())
}

fn decode_jpeg_at(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    width: usize,
    height: usize,
    bit_depth: u32,
) -> Result<()> {
    let expected = width.checked_mul(height).ok_or(Error::ArithmeticOverflow)?;
    let frame = decode_jpeg(input_at(input, in_offset)?)?;
    if (frame.width(), frame.height()) != (width, height) {
        return Err(Error::PixelCountMismatch(
            frame.width(),
            frame.height(),
            frame.width() * frame.height(),
            width,
            height,
            expected,
        ));
    }
    check_bit_depth(frame.precision(), bit_depth)?;
    let samples = frame.quantized_samples(frame.num_components());
    let dst = output_at(out, out_offset, samples.len())?;
    LittleEndian::write_u16_into(&samples, dst);
    Ok(())
}

/// Decodes a sequential JPEG image into `out[out_offset..]`, all components of a pixel next to
/// each other.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(out, input)))]
pub fn jpeg_decode_lossy(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    width: usize,
    height: usize,
    bit_depth: u32,
) -> ErrorKind {
    decode_jpeg_at(out, out_offset, input, in_offset, width, height, bit_depth).into()
}

fn unpack_at(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    in_len: usize,
    bits: u32,
) -> Result<()> {
    let src = input
        .get(in_offset..in_offset.saturating_add(in_len))
        .ok_or(Error::OutOfBounds)?;
    unpack_to_16(bits, src, out.get_mut(out_offset..).unwrap_or_default())?;
    Ok(())
}

/// Expands `in_len` bytes of packed `bits`-bit samples at `input[in_offset..]` into
/// `out[out_offset..]`. Supported packings are 10, 12 and 14 bits.
pub fn unpack_to_16bit(
    out: &mut [u8],
    out_offset: usize,
    input: &[u8],
    in_offset: usize,
    in_len: usize,
    bits: u32,
) -> ErrorKind {
    unpack_at(out, out_offset, input, in_offset, in_len, bits).into()
}
