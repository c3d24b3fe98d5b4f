/*
 *  File: gf.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! Arithmetic in GF(2^8) modulo the AES polynomial x^8 + x^4 + x^3 + x + 1.

use ndarray::{Array, ArrayView, Dimension};

/// Multiplies `b` by 2. Bit 7 is shifted out and fed back into bits 0, 1, 3
/// and 4 (reduction by 0x11B).
#[inline]
pub fn xtimes(b: u8) -> u8 {
    (b << 1) ^ ((b >> 7) * 0x1b)
}

/// Multiplies `b` by a constant of at most four bits by double-and-add.
/// Only the low nibble of `constant` is looked at.
pub fn mult(b: u8, constant: u8) -> u8 {
    let mut result = 0;
    let mut doubled = b;

    for i in 0..4 {
        if (constant >> i) & 1 == 1 {
            result ^= doubled;
        }
        doubled = xtimes(doubled);
    }

    result
}

pub fn xtimes_array<D: Dimension>(data: ArrayView<u8, D>) -> Array<u8, D> {
    data.mapv(xtimes)
}

pub fn mult_array<D: Dimension>(data: ArrayView<u8, D>, constant: u8) -> Array<u8, D> {
    data.mapv(|b| mult(b, constant))
}
