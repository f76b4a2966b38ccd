// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Component-interleaved sample rasters exchanged at image boundaries.

use std::fmt::Debug;

use crate::{
    error::{Error, Result},
    util::{checked_area, new_zeroed_vec},
};

/// Most components a [`Frame`] can hold.
pub const MAX_FRAME_COMPONENTS: usize = 4;

/// An interleaved raster of `f32` samples.
///
/// The raster is `padded_width` x `padded_height`; only the top-left `width` x `height` samples
/// are image content, the rest is padding up to a whole number of coding units.
#[derive(Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    padded_width: usize,
    padded_height: usize,
    num_components: usize,
    precision: u8,
    data: Vec<f32>,
}

impl Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame{{ {}x{} (padded {}x{}), {} components, {} bits }}",
            self.width,
            self.height,
            self.padded_width,
            self.padded_height,
            self.num_components,
            self.precision
        )
    }
}

fn round_up(value: usize, unit: usize) -> usize {
    value.div_ceil(unit) * unit
}

impl Frame {
    /// Creates a zero-filled frame padded to multiples of `unit_width` x `unit_height`.
    pub fn with_padding(
        width: usize,
        height: usize,
        num_components: usize,
        precision: u8,
        unit_width: usize,
        unit_height: usize,
    ) -> Result<Frame> {
        if width == 0 || height == 0 || unit_width == 0 || unit_height == 0 {
            return Err(Error::InvalidImageSize(width, height));
        }
        if !(1..=MAX_FRAME_COMPONENTS).contains(&num_components) {
            return Err(Error::InvalidComponentCount(num_components));
        }
        if !(1..=16).contains(&precision) {
            return Err(Error::InvalidPrecision(precision));
        }
        let padded_width = round_up(width, unit_width);
        let padded_height = round_up(height, unit_height);
        let len = checked_area(padded_width, padded_height)?
            .checked_mul(num_components)
            .ok_or(Error::InvalidImageSize(width, height))?;
        Ok(Frame {
            width,
            height,
            padded_width,
            padded_height,
            num_components,
            precision,
            data: new_zeroed_vec(len)?,
        })
    }

    /// Creates a zero-filled frame padded to whole 8x8 blocks.
    pub fn new(width: usize, height: usize, num_components: usize, precision: u8) -> Result<Frame> {
        Self::with_padding(width, height, num_components, precision, 8, 8)
    }

    /// Creates a frame from `width * height * num_components` interleaved samples, replicating the
    /// last row and column into the padding.
    pub fn from_samples<T: Copy + Into<f32>>(
        width: usize,
        height: usize,
        num_components: usize,
        precision: u8,
        samples: &[T],
    ) -> Result<Frame> {
        let mut frame = Self::new(width, height, num_components, precision)?;
        let row_len = width * num_components;
        if samples.len() < row_len * height {
            return Err(Error::OutOfBounds);
        }
        for (y, src) in samples.chunks_exact(row_len).take(height).enumerate() {
            for (dst, &s) in frame.row_mut(y)[..row_len].iter_mut().zip(src) {
                *dst = s.into();
            }
        }
        frame.replicate_edges();
        Ok(frame)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn padded_width(&self) -> usize {
        self.padded_width
    }

    pub fn padded_height(&self) -> usize {
        self.padded_height
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Largest sample value at this precision.
    pub fn max_value(&self) -> f32 {
        ((1u32 << self.precision) - 1) as f32
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn stride(&self) -> usize {
        self.padded_width * self.num_components
    }

    pub fn row(&self, y: usize) -> &[f32] {
        let stride = self.stride();
        &self.data[y * stride..(y + 1) * stride]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let stride = self.stride();
        &mut self.data[y * stride..(y + 1) * stride]
    }

    pub fn sample(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[y * self.stride() + x * self.num_components + c]
    }

    pub fn set_sample(&mut self, x: usize, y: usize, c: usize, value: f32) {
        let stride = self.stride();
        self.data[y * stride + x * self.num_components + c] = value;
    }

    /// Fills the padding by repeating the last image column and row.
    pub fn replicate_edges(&mut self) {
        let nc = self.num_components;
        let (width, height) = (self.width, self.height);
        for y in 0..height {
            let row = self.row_mut(y);
            let (image, padding) = row.split_at_mut(width * nc);
            let last = &image[(width - 1) * nc..];
            for px in padding.chunks_exact_mut(nc) {
                px.copy_from_slice(last);
            }
        }
        let stride = self.stride();
        let (image, padding) = self.data.split_at_mut(height * stride);
        let last = &image[(height - 1) * stride..];
        for row in padding.chunks_exact_mut(stride) {
            row.copy_from_slice(last);
        }
    }

    /// Returns a copy of the image content padded to multiples of `unit_width` x `unit_height`,
    /// with replicated edges.
    pub fn repadded(&self, unit_width: usize, unit_height: usize) -> Result<Frame> {
        let mut frame = Self::with_padding(
            self.width,
            self.height,
            self.num_components,
            self.precision,
            unit_width,
            unit_height,
        )?;
        let row_len = self.width * self.num_components;
        for y in 0..self.height {
            frame.row_mut(y)[..row_len].copy_from_slice(&self.row(y)[..row_len]);
        }
        frame.replicate_edges();
        Ok(frame)
    }

    fn for_each_pixel(&mut self, mut f: impl FnMut(&mut [f32])) {
        let nc = self.num_components;
        let row_len = self.width * nc;
        for y in 0..self.height {
            self.row_mut(y)[..row_len].chunks_exact_mut(nc).for_each(&mut f);
        }
    }

    /// Converts RGB to YCbCr in place, padding included. Frames without three components are
    /// left untouched.
    pub fn rgb_to_ycc(&mut self) {
        if self.num_components != 3 {
            return;
        }
        let shift = (1u32 << (self.precision - 1)) as f32;
        self.data.chunks_exact_mut(3).for_each(|px| {
            let (r, g, b) = (px[0], px[1], px[2]);
            px[0] = 0.299 * r + 0.587 * g + 0.114 * b;
            px[1] = -0.1687 * r - 0.3313 * g + 0.5 * b + shift;
            px[2] = 0.5 * r - 0.4187 * g - 0.0813 * b + shift;
        });
    }

    /// Converts YCbCr (three components) or YCCK (four components) to RGB in place. With four
    /// components the last slot becomes an opaque alpha of 255.
    pub fn ycc_to_rgb(&mut self) {
        let shift = (1u32 << (self.precision - 1)) as f32;
        let denom = (1u32 << self.precision) as f32;
        let ycc = move |y: f32, cb: f32, cr: f32| {
            (
                y + 1.402 * (cr - shift),
                y - 0.34414 * (cb - shift) - 0.71414 * (cr - shift),
                y + 1.772 * (cb - shift),
            )
        };
        match self.num_components {
            3 => self.for_each_pixel(|px| {
                (px[0], px[1], px[2]) = ycc(px[0], px[1], px[2]);
            }),
            4 => self.for_each_pixel(|px| {
                let (c, m, y) = ycc(px[0], px[1], px[2]);
                let k = px[3];
                px[0] = k - (c * k) / denom;
                px[1] = k - (m * k) / denom;
                px[2] = k - (y * k) / denom;
                px[3] = 255.0;
            }),
            _ => {}
        }
    }

    /// Rounds and clamps the image content to integers, `channels` per pixel.
    pub fn quantized_samples(&self, channels: usize) -> Vec<u16> {
        let max = self.max_value();
        let channels = channels.min(self.num_components);
        let mut out = Vec::with_capacity(self.width * self.height * channels);
        for y in 0..self.height {
            let row = &self.row(y)[..self.width * self.num_components];
            for px in row.chunks_exact(self.num_components) {
                out.extend(px[..channels].iter().map(|&s| s.round().clamp(0.0, max) as u16));
            }
        }
        out
    }
}
