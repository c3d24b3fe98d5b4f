/*
 *  File: shift_rows.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! ShiftRows over a column-major 4x4 state: byte `r + 4c` sits in row `r`,
//! column `c`.

use ndarray::{Array2, ArrayView2};

use crate::{check_block_width, row_to_block, Block, Direction, Result};

/// Row `r` rotates left by `r` when encrypting and right by `r` when
/// decrypting.
pub fn shift_rows(block: &mut Block, direction: Direction) {
    let input = *block;

    for c in 0..4 {
        for r in 1..4 {
            let source = match direction {
                Direction::Encrypt => (c + r) % 4,
                Direction::Decrypt => (c + 4 - r) % 4,
            };
            block[r + 4 * c] = input[r + 4 * source];
        }
    }
}

/// Applies [`shift_rows`] to every row of a `D x 16` batch.
pub fn shift_rows_batch(blocks: ArrayView2<u8>, direction: Direction) -> Result<Array2<u8>> {
    check_block_width(&blocks, "shift_rows")?;
    let mut out = blocks.to_owned();

    for mut row in out.rows_mut() {
        let mut block = row_to_block(row.view());
        shift_rows(&mut block, direction);
        row.assign(&ndarray::aview1(&block));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn rotates_rows_of_index_block() {
        let mut block: Block = std::array::from_fn(|i| i as u8);
        shift_rows(&mut block, Direction::Encrypt);
        assert_eq!(
            block,
            [0, 5, 10, 15, 4, 9, 14, 3, 8, 13, 2, 7, 12, 1, 6, 11]
        );

        shift_rows(&mut block, Direction::Decrypt);
        assert_eq!(block, std::array::from_fn::<u8, 16, _>(|i| i as u8));
    }

    #[test]
    fn matches_known_state() {
        let mut block: Block = hex::decode("637c777bf26b6fc53001672bfed7ab76")
            .unwrap()
            .try_into()
            .unwrap();
        shift_rows(&mut block, Direction::Encrypt);
        assert_eq!(hex::encode(block), "636b6776f201ab7b30d777c5fe7c6f2b");
    }

    #[test]
    fn batch_rows_are_independent() {
        let blocks = Array2::from_shape_fn((3, 16), |(d, i)| (d * 16 + i) as u8);
        let shifted = shift_rows_batch(blocks.view(), Direction::Encrypt).unwrap();

        for (d, row) in shifted.rows().into_iter().enumerate() {
            let mut block: Block = std::array::from_fn(|i| (d * 16 + i) as u8);
            shift_rows(&mut block, Direction::Encrypt);
            assert_eq!(row.to_vec(), block.to_vec());
        }
    }

    #[test]
    fn batch_rejects_partial_blocks() {
        let blocks = Array2::<u8>::zeros((2, 12));
        assert!(shift_rows_batch(blocks.view(), Direction::Decrypt).is_err());
    }
}
