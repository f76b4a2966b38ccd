// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use num_derive::{FromPrimitive, ToPrimitive};
use thiserror::Error;

use crate::huffman::TableClass;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Read out of bounds")]
    OutOfBounds,
    #[error("Output buffer too small: {0} bytes needed, {1} available")]
    OutputTooSmall(usize, usize),
    #[error("Missing SOI marker, found {0:02x}{1:02x}")]
    MissingSoi(u8, u8),
    #[error("Unhandled marker 0x{0:04x}")]
    UnsupportedMarker(u16),
    #[error("{0} not supported")]
    UnsupportedProcess(&'static str),
    #[error("Invalid {1} segment length {0}")]
    InvalidSegmentLength(u16, &'static str),
    #[error("Invalid quantization table destination {0}")]
    InvalidQuantTableIndex(u8),
    #[error("Invalid quantization table precision {0}")]
    InvalidQuantPrecision(u8),
    #[error("Invalid Huffman table class {0}")]
    InvalidHuffmanClass(u8),
    #[error("Invalid Huffman table destination {0}")]
    InvalidHuffmanTableIndex(u8),
    #[error("Huffman table {0:?}{1} is not defined")]
    MissingHuffmanTable(TableClass, u8),
    #[error("Invalid Huffman table: {0}")]
    InvalidHuffmanTable(&'static str),
    #[error("Invalid Huffman code")]
    InvalidHuffmanCode,
    #[error("Symbol 0x{0:02x} has no Huffman code")]
    MissingHuffmanSymbol(u8),
    #[error("Huffman code length exceeds 32 bits")]
    HuffmanCodeTooLong,
    #[error("Coefficient index {0} past the end of the block")]
    CoefficientOverflow(usize),
    #[error("Coefficient {0} does not fit a 15-bit category")]
    CoefficientTooLarge(i32),
    #[error("Invalid sample precision {0}")]
    InvalidPrecision(u8),
    #[error("Invalid image size: {0}x{1}")]
    InvalidImageSize(usize, usize),
    #[error("Invalid sampling factors {0}x{1} for component {2}")]
    InvalidSamplingFactors(u8, u8, u8),
    #[error("Invalid number of components: {0}")]
    InvalidComponentCount(usize),
    #[error("Scan references unknown component {0}")]
    UnknownComponent(u8),
    #[error("Start of scan before frame header")]
    ScanBeforeFrame,
    #[error("Unsupported spectral selection Ss={0} Se={1}")]
    UnsupportedSpectralSelection(u8, u8),
    #[error("Unsupported successive approximation Ah={0} Al={1}")]
    UnsupportedSuccessiveApproximation(u8, u8),
    #[error("Unexpected end of image before any frame was decoded")]
    NoFrame,
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    // Lossless JPEG
    #[error("Invalid lossless predictor {0}")]
    InvalidPredictor(u8),
    #[error("Invalid point transform {0} for precision {1}")]
    InvalidPointTransform(u8, u8),
    #[error("Lossless JPEG stream has no SOF3 frame header")]
    MissingFrameHeader,
    #[error("Component count mismatch: frame has {0}, scan has {1}")]
    ComponentCountMismatch(usize, usize),
    #[error("Sample {0} exceeds {1}-bit precision")]
    SampleOutOfRange(u16, u8),
    #[error("Linearization table has {0} entries, at least {1} needed")]
    InvalidLinearizationTable(usize, usize),
    // Embedded decoder checks
    #[error("Decoded {0}x{1} ({2} pixels), expected {3}x{4} ({5} pixels)")]
    PixelCountMismatch(usize, usize, usize, usize, usize, usize),
    #[error("Decoded bit depth {0}, expected {1}")]
    BitDepthMismatch(u8, u32),
    #[error("Unsupported packed bit depth {0}")]
    UnsupportedPacking(u32),
    // PNM
    #[error("Invalid PNM header")]
    InvalidPnmHeader,
    #[error("Unsupported PNM magic P{0}")]
    UnsupportedPnmType(char),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of outcomes reported by the embedded decoder entry points.
///
/// The discriminants are stable so the value can cross a foreign function boundary as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum ErrorKind {
    None = 0,
    BadPath = 2,
    BadFile = 3,
    BadMetadata = 4,
    NoVideoStream = 5,
    FrameNotPresent = 6,
    BadFrame = 7,
    BadImageData = 8,
    BadFrameIndex = 9,
    NotImplemented = 10,
}

impl Error {
    /// Classifies the error for callers that only understand [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            MissingSoi(..) | InvalidSegmentLength(..) | ScanBeforeFrame | MissingFrameHeader
            | InvalidPnmHeader => ErrorKind::BadFile,
            UnsupportedMarker(_)
            | UnsupportedProcess(_)
            | UnsupportedSpectralSelection(..)
            | UnsupportedSuccessiveApproximation(..)
            | UnsupportedPacking(_)
            | UnsupportedPnmType(_) => ErrorKind::NotImplemented,
            InvalidPrecision(_)
            | InvalidImageSize(..)
            | InvalidSamplingFactors(..)
            | InvalidComponentCount(_)
            | InvalidPointTransform(..)
            | InvalidLinearizationTable(..)
            | PixelCountMismatch(..)
            | BitDepthMismatch(..) => ErrorKind::BadMetadata,
            NoFrame => ErrorKind::FrameNotPresent,
            OutputTooSmall(..) | OutOfMemory(_) => ErrorKind::BadFrame,
            OutOfBounds
            | InvalidQuantTableIndex(_)
            | InvalidQuantPrecision(_)
            | InvalidHuffmanClass(_)
            | InvalidHuffmanTableIndex(_)
            | MissingHuffmanTable(..)
            | InvalidHuffmanTable(_)
            | InvalidHuffmanCode
            | MissingHuffmanSymbol(_)
            | HuffmanCodeTooLong
            | CoefficientOverflow(_)
            | CoefficientTooLarge(_)
            | UnknownComponent(_)
            | ArithmeticOverflow
            | InvalidPredictor(_)
            | SampleOutOfRange(..)
            | ComponentCountMismatch(..) => ErrorKind::BadImageData,
        }
    }
}

impl From<Result<()>> for ErrorKind {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => ErrorKind::None,
            Err(err) => err.kind(),
        }
    }
}

#[cfg(test)]
mod test {
    use num_traits::{FromPrimitive, ToPrimitive};

    use super::*;

    #[test]
    fn kind_round_trips_through_i32() {
        for kind in [
            ErrorKind::None,
            ErrorKind::BadPath,
            ErrorKind::BadFile,
            ErrorKind::BadMetadata,
            ErrorKind::NoVideoStream,
            ErrorKind::FrameNotPresent,
            ErrorKind::BadFrame,
            ErrorKind::BadImageData,
            ErrorKind::BadFrameIndex,
            ErrorKind::NotImplemented,
        ] {
            let value = kind.to_i32().unwrap();
            assert_eq!(ErrorKind::from_i32(value), Some(kind));
        }
        assert_eq!(ErrorKind::from_i32(1), None);
        assert_eq!(ErrorKind::from_i32(11), None);
    }

    #[test]
    fn errors_map_to_kinds() {
        assert_eq!(Error::OutOfBounds.kind(), ErrorKind::BadImageData);
        assert_eq!(
            Error::UnsupportedProcess("Progressive DCT").kind(),
            ErrorKind::NotImplemented
        );
        assert_eq!(Error::BitDepthMismatch(12, 14).kind(), ErrorKind::BadMetadata);
        assert_eq!(ErrorKind::from(Ok(())), ErrorKind::None);
        assert_eq!(
            ErrorKind::from(Err(Error::MissingSoi(0, 0))),
            ErrorKind::BadFile
        );
    }
}
