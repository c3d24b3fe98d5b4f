/*
 *  File: lib.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! AES-128 with leakage capture, and DPA/CPA key recovery over power traces.

use ndarray::{Array2, ArrayView1, ArrayView2};

pub mod analysis;
pub mod cipher;
pub mod config;
pub mod error;
pub mod gf;
pub mod key_schedule;
pub mod leakage;
pub mod mix_columns;
pub mod sbox;
pub mod shift_rows;
pub mod simulate;
pub mod trace_file;

pub use analysis::{analyze, recover_key, welch_t, Analysis, Analyzer, Mode};
pub use cipher::{
    crypt, crypt_and_leak, decrypt, decrypt_and_leak, encrypt, encrypt_and_leak, Aes128,
    LeakCapture, MixColumnsForm,
};
pub use error::{Error, Result};
pub use key_schedule::{expand_key, round_key, RoundKeys};

/// One AES-128 state, column-major.
pub type Block = [u8; 16];

pub const BLOCK_SIZE: usize = 16;

/// Which way a transform runs. The lab scripts encode this as `1` (encrypt)
/// and `0` (decrypt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl TryFrom<u8> for Direction {
    type Error = Error;

    fn try_from(flag: u8) -> Result<Self> {
        match flag {
            1 => Ok(Direction::Encrypt),
            0 => Ok(Direction::Decrypt),
            other => Err(Error::InvalidMode(format!("direction flag {other}"))),
        }
    }
}

/// Splits a flat byte buffer into a `D x 16` batch of blocks.
pub fn blocks_from_bytes(bytes: &[u8]) -> Result<Array2<u8>> {
    if bytes.len() % BLOCK_SIZE != 0 {
        return Err(Error::Shape {
            context: "block buffer length",
            expected: bytes.len().next_multiple_of(BLOCK_SIZE),
            actual: bytes.len(),
        });
    }

    Array2::from_shape_vec((bytes.len() / BLOCK_SIZE, BLOCK_SIZE), bytes.to_vec()).map_err(|_| {
        Error::Shape {
            context: "block buffer length",
            expected: BLOCK_SIZE,
            actual: bytes.len(),
        }
    })
}

pub(crate) fn check_block_width(blocks: &ArrayView2<u8>, context: &'static str) -> Result<()> {
    if blocks.ncols() != BLOCK_SIZE {
        return Err(Error::Shape {
            context,
            expected: BLOCK_SIZE,
            actual: blocks.ncols(),
        });
    }
    Ok(())
}

/// Copies one batch row out as a block. The width must already be checked.
pub(crate) fn row_to_block(row: ArrayView1<u8>) -> Block {
    std::array::from_fn(|i| row[i])
}

/// Checks that `key` is exactly one block long and copies it out.
pub(crate) fn key_block(key: &[u8]) -> Result<Block> {
    key.try_into().map_err(|_| Error::Shape {
        context: "key",
        expected: BLOCK_SIZE,
        actual: key.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_from_flag() {
        assert_eq!(Direction::try_from(1).unwrap(), Direction::Encrypt);
        assert_eq!(Direction::try_from(0).unwrap(), Direction::Decrypt);
        assert!(matches!(
            Direction::try_from(2),
            Err(Error::InvalidMode(_))
        ));
    }

    #[test]
    fn flat_buffers_split_into_blocks() {
        let blocks = blocks_from_bytes(&[7u8; 48]).unwrap();
        assert_eq!(blocks.dim(), (3, 16));
        assert!(matches!(
            blocks_from_bytes(&[0u8; 20]),
            Err(Error::Shape { actual: 20, .. })
        ));
    }

    #[test]
    fn key_must_be_one_block() {
        assert!(key_block(&[0u8; 16]).is_ok());
        assert!(matches!(
            key_block(&[0u8; 15]),
            Err(Error::Shape {
                expected: 16,
                actual: 15,
                ..
            })
        ));
    }
}
