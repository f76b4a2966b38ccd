// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Checked entry into the bit-unpacking kernels.

use octopus_simd::unpack::{unpack10, unpack12, unpack14};

use crate::error::{Error, Result};

/// Packed bytes and samples of one packing group for `bits`-bit samples.
fn group(bits: u32) -> Result<(usize, usize)> {
    match bits {
        10 => Ok((5, 4)),
        12 => Ok((3, 2)),
        14 => Ok((7, 4)),
        _ => Err(Error::UnsupportedPacking(bits)),
    }
}

/// Bytes of 16-bit output produced from `packed_len` packed bytes. Incomplete trailing groups
/// are not unpacked.
pub fn unpacked_len(bits: u32, packed_len: usize) -> Result<usize> {
    let (group_bytes, group_samples) = group(bits)?;
    Ok(packed_len / group_bytes * group_samples * 2)
}

/// Expands big-endian packed `bits`-bit samples into 16-bit little-endian samples, returning
/// the number of samples written.
pub fn unpack_to_16(bits: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
    let needed = unpacked_len(bits, input.len())?;
    if output.len() < needed {
        return Err(Error::OutputTooSmall(needed, output.len()));
    }
    Ok(match bits {
        10 => unpack10(input, output),
        12 => unpack12(input, output),
        _ => unpack14(input, output),
    })
}

#[cfg(test)]
mod test {
    use byteorder::{ByteOrder, LittleEndian};
    use octopus_simd::{SimdDescriptor, test_all_instruction_sets, unpack::unpack12_with};
    use rand::Rng;
    use test_log::test;

    use super::*;
    use crate::util::test::test_rng;

    fn unpack(bits: u32, input: &[u8]) -> Vec<u16> {
        let mut out = vec![0; unpacked_len(bits, input.len()).unwrap()];
        let n = unpack_to_16(bits, input, &mut out).unwrap();
        let mut samples = vec![0; n];
        LittleEndian::read_u16_into(&out, &mut samples);
        samples
    }

    #[test]
    fn known_groups() {
        assert_eq!(unpack(12, &[0xab, 0xcd, 0xef]), [0xabc, 0xdef]);
        assert_eq!(
            unpack(10, &[0x12, 0x34, 0x56, 0x78, 0x9a]),
            [0x048, 0x345, 0x19e, 0x09a]
        );
        assert_eq!(
            unpack(14, &[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde]),
            [0x048d, 0x0567, 0x226a, 0x3cde]
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        assert_eq!(unpack(12, &[0xab, 0xcd, 0xef, 0x12, 0x34]), [0xabc, 0xdef]);
        assert_eq!(unpacked_len(14, 13).unwrap(), 8);
    }

    #[test]
    fn checks_output_size() {
        let mut out = [0u8; 7];
        assert!(matches!(
            unpack_to_16(12, &[0; 6], &mut out),
            Err(Error::OutputTooSmall(8, 7))
        ));
        assert!(matches!(
            unpack_to_16(11, &[0; 6], &mut out),
            Err(Error::UnsupportedPacking(11))
        ));
    }

    fn dispatch_matches_descriptor<D: SimdDescriptor>(d: D) {
        let mut rng = test_rng(12);
        for len in [0, 3, 24, 29, 300, 301] {
            let mut input = vec![0u8; len];
            rng.fill(&mut input[..]);
            let mut dispatched = vec![0; unpacked_len(12, len).unwrap()];
            let mut direct = dispatched.clone();
            let n = unpack_to_16(12, &input, &mut dispatched).unwrap();
            assert_eq!(unpack12_with(d, &input, &mut direct), n);
            assert_eq!(dispatched, direct);
        }
    }
    test_all_instruction_sets!(dispatch_matches_descriptor);
}
