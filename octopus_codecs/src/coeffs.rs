// Copyright (c) the Octopus Player Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Entropy coding of 8x8 coefficient blocks (ITU T.81 F.1.2 and F.2.2).
//!
//! Blocks are kept in natural order; [`ZIGZAG`] is applied only while reading or writing.

use octopus_transforms::BLOCK_SIZE;

use crate::{
    bit_reader::{BitReader, Bits, try_bits},
    bit_writer::BitWriter,
    error::{Error, Result},
    huffman::{FrequencyModel, HuffmanTable},
};

/// Quantized coefficients in natural order. Element 0 holds the DC value, or the DC difference
/// while the block is being entropy coded.
pub type CoeffBlock = [i32; BLOCK_SIZE];

/// Maps a position in zig-zag scan order to the natural (row-major) index.
#[rustfmt::skip]
pub const ZIGZAG: [usize; BLOCK_SIZE] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// End of block.
pub const EOB: u8 = 0x00;
/// Run of sixteen zero coefficients.
pub const ZRL: u8 = 0xf0;

/// Largest magnitude category an entropy-coded value may have.
pub const MAX_CATEGORY: u8 = 15;

/// Reconstructs a value from its magnitude category and `cat` extra bits (Figure F.12).
#[inline]
pub fn decode_coeff(cat: u8, extra: u16) -> i32 {
    if cat == 0 {
        return 0;
    }
    let extra = extra as i32;
    if (extra >> (cat - 1)) == 0 {
        -(1 << cat) + extra + 1
    } else {
        extra
    }
}

/// Number of magnitude bits of `c`; 0 for 0.
#[inline]
pub fn encode_cat(c: i32) -> u8 {
    (32 - c.unsigned_abs().leading_zeros()) as u8
}

/// Extra bits transmitted after the category of `c`.
#[inline]
pub fn encode_extra(c: i32, cat: u8) -> u16 {
    let v = if c < 0 { c - 1 } else { c };
    (v & ((1 << cat) - 1)) as u16
}

#[inline]
pub fn rs(run: u8, cat: u8) -> u8 {
    (run << 4) | cat
}

/// Reads `cat` extra bits and reconstructs the value they encode.
#[inline]
fn read_value(br: &mut BitReader, cat: u8) -> Result<Bits<i32>> {
    if cat > MAX_CATEGORY {
        return Err(Error::InvalidHuffmanCode);
    }
    let extra = try_bits!(br.read_bits(cat));
    Ok(Bits::Data(decode_coeff(cat, extra)))
}

/// Decodes one block: the DC difference into `block[0]`, the AC coefficients into their natural
/// positions. AC coefficients not present in the stream are zeroed.
pub fn read_block(
    br: &mut BitReader,
    dc: &HuffmanTable,
    ac: &HuffmanTable,
    block: &mut CoeffBlock,
) -> Result<Bits<()>> {
    let cat = try_bits!(dc.read_symbol(br));
    block[0] = try_bits!(read_value(br, cat));
    block[1..].fill(0);

    let mut i = 1;
    while i < BLOCK_SIZE {
        let symbol = try_bits!(ac.read_symbol(br));
        if symbol == EOB {
            break;
        }
        i += (symbol >> 4) as usize;
        if i >= BLOCK_SIZE {
            return Err(Error::CoefficientOverflow(i));
        }
        block[ZIGZAG[i]] = try_bits!(read_value(br, symbol & 0x0f));
        i += 1;
    }
    Ok(Bits::Data(()))
}

/// One Huffman-coded symbol of a block, followed by `cat` extra bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Dc { cat: u8, extra: u16 },
    Ac { rs: u8, extra: u16 },
}

impl Symbol {
    fn dc(value: i32) -> Result<Symbol> {
        let cat = encode_cat(value);
        if cat > MAX_CATEGORY {
            return Err(Error::CoefficientTooLarge(value));
        }
        Ok(Symbol::Dc {
            cat,
            extra: encode_extra(value, cat),
        })
    }

    fn ac(run: u8, value: i32) -> Result<Symbol> {
        let cat = encode_cat(value);
        if cat > MAX_CATEGORY - 1 {
            return Err(Error::CoefficientTooLarge(value));
        }
        Ok(Symbol::Ac {
            rs: rs(run, cat),
            extra: encode_extra(value, cat),
        })
    }

    const fn marker(rs: u8) -> Symbol {
        Symbol::Ac { rs, extra: 0 }
    }
}

/// Produces the symbols of a block, DC difference in `block[0]`.
///
/// Trailing zero coefficients always collapse into an EOB; ZRL symbols are only emitted in front
/// of a nonzero coefficient, and no EOB follows a nonzero last coefficient.
pub fn for_each_symbol(
    block: &CoeffBlock,
    mut f: impl FnMut(Symbol) -> Result<()>,
) -> Result<()> {
    f(Symbol::dc(block[0])?)?;
    let mut run = 0u8;
    for i in 1..BLOCK_SIZE {
        let c = block[ZIGZAG[i]];
        if c == 0 {
            if i == BLOCK_SIZE - 1 {
                f(Symbol::marker(EOB))?;
            } else {
                run += 1;
            }
            continue;
        }
        while run > 15 {
            f(Symbol::marker(ZRL))?;
            run -= 16;
        }
        f(Symbol::ac(run, c)?)?;
        run = 0;
    }
    Ok(())
}

/// Entropy codes one block.
pub fn write_block(
    bw: &mut BitWriter,
    dc: &HuffmanTable,
    ac: &HuffmanTable,
    block: &CoeffBlock,
) -> Result<()> {
    for_each_symbol(block, |symbol| match symbol {
        Symbol::Dc { cat, extra } => {
            dc.write_symbol(bw, cat)?;
            bw.put_bits(extra as u32, cat)
        }
        Symbol::Ac { rs, extra } => {
            ac.write_symbol(bw, rs)?;
            bw.put_bits(extra as u32, rs & 0x0f)
        }
    })
}

/// Counts the symbols [`write_block`] would emit, without writing anything.
pub fn count_block(dc: &mut FrequencyModel, ac: &mut FrequencyModel, block: &CoeffBlock) -> Result<()> {
    for_each_symbol(block, |symbol| {
        match symbol {
            Symbol::Dc { cat, .. } => dc.add(cat),
            Symbol::Ac { rs, .. } => ac.add(rs),
        }
        Ok(())
    })
}
