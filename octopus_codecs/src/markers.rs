// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Marker codes (ITU T.81 Table B.1).

pub const TEM: u16 = 0xff01;

pub const SOF0: u16 = 0xffc0;
pub const SOF1: u16 = 0xffc1;
pub const SOF2: u16 = 0xffc2;
pub const SOF3: u16 = 0xffc3;
pub const DHT: u16 = 0xffc4;
pub const SOF9: u16 = 0xffc9;
pub const SOF10: u16 = 0xffca;
pub const DAC: u16 = 0xffcc;

pub const RST0: u16 = 0xffd0;
pub const RST7: u16 = 0xffd7;
pub const SOI: u16 = 0xffd8;
pub const EOI: u16 = 0xffd9;
pub const SOS: u16 = 0xffda;
pub const DQT: u16 = 0xffdb;
pub const DNL: u16 = 0xffdc;
pub const DRI: u16 = 0xffdd;

pub const APP0: u16 = 0xffe0;
pub const APP15: u16 = 0xffef;
pub const COM: u16 = 0xfffe;

/// Returns the restart marker with index `n` modulo 8.
pub fn rst(n: usize) -> u16 {
    RST0 + (n % 8) as u16
}

/// Returns true for any of the thirteen start-of-frame markers.
pub fn is_sof(marker: u16) -> bool {
    matches!(marker, 0xffc0..=0xffcf) && !matches!(marker, DHT | 0xffc8 | DAC)
}

/// Returns true for start-of-frame markers of DCT-based processes.
pub fn is_dct_sof(marker: u16) -> bool {
    is_sof(marker) && !matches!(marker, SOF3 | 0xffc7 | 0xffcb | 0xffcf)
}

/// Human-readable name of the process a start-of-frame marker selects.
pub fn process_name(marker: u16) -> &'static str {
    match marker {
        SOF0 => "Baseline DCT",
        SOF1 => "Extended sequential DCT",
        SOF2 => "Progressive DCT",
        SOF3 => "Lossless (sequential)",
        SOF9 => "Extended sequential DCT, arithmetic coding",
        SOF10 => "Progressive DCT, arithmetic coding",
        0xffc5..=0xffc7 | 0xffcd..=0xffcf => "Hierarchical coding",
        0xffcb => "Lossless, arithmetic coding",
        _ => "Unknown process",
    }
}
