/*
 *  File: mix_columns.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! MixColumns, in two interchangeable forms.
//!
//! The closed form multiplies each column by the circulant matrix
//! `(2 3 1 1)` or `(14 11 13 9)`. The byte-serial form gets the same result
//! through the XOR/xtimes sequence an 8-bit microcontroller runs, and can hand
//! back every intermediate byte of that sequence. Those intermediates are what
//! a power trace of such a device leaks, so their order and content are fixed.

use crate::gf::{mult, xtimes};
use crate::{Block, Direction};

/// Intermediates per column of the byte-serial forward transform.
pub const ENCRYPT_LEAKS: usize = 9;
/// Intermediates per column of the byte-serial inverse transform.
pub const DECRYPT_LEAKS: usize = 18;

pub type Column = [u8; 4];

const FORWARD: [u8; 4] = [2, 3, 1, 1];
const INVERSE: [u8; 4] = [14, 11, 13, 9];

pub fn leak_count(direction: Direction) -> usize {
    match direction {
        Direction::Encrypt => ENCRYPT_LEAKS,
        Direction::Decrypt => DECRYPT_LEAKS,
    }
}

pub fn mix_column(column: Column, direction: Direction) -> Column {
    let row = match direction {
        Direction::Encrypt => FORWARD,
        Direction::Decrypt => INVERSE,
    };

    std::array::from_fn(|i| {
        (0..4).fold(0, |acc, j| acc ^ mult(column[j], row[(j + 4 - i) % 4]))
    })
}

/// Forward byte-serial column mix. `leak` receives, in order: the column sum,
/// then for each output byte `i` the pair `a[i] ^ a[i+1]` and its double.
pub fn mix_column_serial(a: Column, leak: &mut [u8; ENCRYPT_LEAKS]) -> Column {
    let tmp = a[0] ^ a[1] ^ a[2] ^ a[3];
    leak[0] = tmp;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let tm = a[i] ^ a[(i + 1) % 4];
        leak[1 + 2 * i] = tm;
        let tm = xtimes(tm);
        leak[2 + 2 * i] = tm;
        out[i] = a[i] ^ tm ^ tmp;
    }

    out
}

/// Inverse byte-serial column mix. Two helper terms `h1` (even rows) and `h2`
/// (odd rows) fold the extra multiples of 4 and 9 in before the forward-style
/// pass. `leak` receives the 10 helper intermediates followed by the 8
/// pairwise ones.
pub fn unmix_column_serial(a: Column, leak: &mut [u8; DECRYPT_LEAKS]) -> Column {
    let tmp = a[0] ^ a[1] ^ a[2] ^ a[3];
    leak[0] = tmp;
    let xtmp = xtimes(tmp);
    leak[1] = xtmp;

    let mut h1 = xtmp ^ a[0] ^ a[2];
    leak[2] = h1;
    h1 = xtimes(h1);
    leak[3] = h1;
    h1 = xtimes(h1);
    leak[4] = h1;
    h1 ^= tmp;
    leak[5] = h1;

    let mut h2 = xtmp ^ a[1] ^ a[3];
    leak[6] = h2;
    h2 = xtimes(h2);
    leak[7] = h2;
    h2 = xtimes(h2);
    leak[8] = h2;
    h2 ^= tmp;
    leak[9] = h2;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let tm = a[i] ^ a[(i + 1) % 4];
        leak[10 + 2 * i] = tm;
        let tm = xtimes(tm);
        leak[11 + 2 * i] = tm;
        out[i] = a[i] ^ tm ^ if i % 2 == 0 { h1 } else { h2 };
    }

    out
}

fn column(block: &Block, c: usize) -> Column {
    [block[4 * c], block[4 * c + 1], block[4 * c + 2], block[4 * c + 3]]
}

fn set_column(block: &mut Block, c: usize, value: Column) {
    block[4 * c..4 * c + 4].copy_from_slice(&value);
}

pub fn mix_columns(block: &mut Block, direction: Direction) {
    for c in 0..4 {
        let mixed = mix_column(column(block, c), direction);
        set_column(block, c, mixed);
    }
}

/// Byte-serial MixColumns over a whole block. `leak[c]` is filled with the
/// intermediates of column `c`; only the first [`leak_count`] entries of each
/// row are written.
pub fn mix_columns_serial(
    block: &mut Block,
    direction: Direction,
    leak: &mut [[u8; DECRYPT_LEAKS]; 4],
) {
    for (c, column_leak) in leak.iter_mut().enumerate() {
        let input = column(block, c);
        let mixed = match direction {
            Direction::Encrypt => {
                let mut forward = [0u8; ENCRYPT_LEAKS];
                let mixed = mix_column_serial(input, &mut forward);
                column_leak[..ENCRYPT_LEAKS].copy_from_slice(&forward);
                mixed
            }
            Direction::Decrypt => unmix_column_serial(input, column_leak),
        };
        set_column(block, c, mixed);
    }
}
