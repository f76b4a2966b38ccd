// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod api;
pub mod bit_reader;
pub mod bit_writer;
pub mod coeffs;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod huffman;
pub mod lj92;
pub mod markers;
pub mod pnm;
pub mod quant;
pub mod scan;
pub mod unpack;
pub mod util;

pub use decoder::{decode_jpeg, is_lossy};
pub use encoder::{EncoderOptions, encode_jpeg};
pub use error::{Error, ErrorKind, Result};
pub use frame::Frame;
