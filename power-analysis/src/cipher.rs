/*
 *  File: cipher.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! AES-128 over batches of blocks, plus the leak-capturing variant that
//! records every intermediate state.

use log::debug;
use ndarray::{Array2, Array3, Array4, ArrayView2, Axis, Zip};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::key_schedule::{expand_key, RoundKeys, ROUNDS};
use crate::leakage::hamming_weight_total;
use crate::mix_columns::{leak_count, mix_columns, mix_columns_serial, DECRYPT_LEAKS};
use crate::sbox::sub_bytes;
use crate::shift_rows::shift_rows;
use crate::{
    check_block_width, key_block, row_to_block, Block, Direction, Error, Result, BLOCK_SIZE,
};

/// Snapshots recorded per block by the leak-capturing cipher.
pub const STATES: usize = 41;
/// Rounds that run MixColumns (all but the last).
pub const MIX_ROUNDS: usize = ROUNDS - 1;

/// Encryption order: 0 plaintext, 1 after whitening, then for round `i`
/// `2+4i` SubBytes, `3+4i` ShiftRows, `4+4i` MixColumns, `5+4i` AddRoundKey.
/// The last round has no MixColumns, so its AddRoundKey lands on 40.
/// Decryption writes the same logical state to the same index.
pub type StateTrace = [Block; STATES];

type ColumnLeaks = [[u8; DECRYPT_LEAKS]; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixColumnsForm {
    #[default]
    ClosedForm,
    ByteSerial,
}

fn add_round_key(block: &mut Block, key: &Block) {
    for (b, k) in block.iter_mut().zip(key) {
        *b ^= k;
    }
}

#[derive(Debug, Clone)]
pub struct Aes128 {
    key: Block,
    round_keys: RoundKeys,
    form: MixColumnsForm,
}

impl Aes128 {
    pub fn new(key: &[u8]) -> Result<Self> {
        Ok(Self {
            key: key_block(key)?,
            round_keys: expand_key(key)?,
            form: MixColumnsForm::default(),
        })
    }

    pub fn with_mix_columns(mut self, form: MixColumnsForm) -> Self {
        self.form = form;
        self
    }

    pub fn round_keys(&self) -> &RoundKeys {
        &self.round_keys
    }

    fn mix(&self, block: &mut Block, direction: Direction) {
        match self.form {
            MixColumnsForm::ClosedForm => mix_columns(block, direction),
            MixColumnsForm::ByteSerial => {
                let mut scratch = [[0u8; DECRYPT_LEAKS]; 4];
                mix_columns_serial(block, direction, &mut scratch);
            }
        }
    }

    pub fn encrypt_block(&self, block: &mut Block) {
        add_round_key(block, &self.key);

        for (i, round_key) in self.round_keys.iter().enumerate() {
            sub_bytes(block, Direction::Encrypt);
            shift_rows(block, Direction::Encrypt);
            if i != ROUNDS - 1 {
                self.mix(block, Direction::Encrypt);
            }
            add_round_key(block, round_key);
        }
    }

    pub fn decrypt_block(&self, block: &mut Block) {
        for (i, round_key) in self.round_keys.iter().enumerate().rev() {
            add_round_key(block, round_key);
            if i != ROUNDS - 1 {
                self.mix(block, Direction::Decrypt);
            }
            shift_rows(block, Direction::Decrypt);
            sub_bytes(block, Direction::Decrypt);
        }

        add_round_key(block, &self.key);
    }

    pub fn crypt_block(&self, block: &mut Block, direction: Direction) {
        match direction {
            Direction::Encrypt => self.encrypt_block(block),
            Direction::Decrypt => self.decrypt_block(block),
        }
    }

    /// Runs every row of a `D x 16` batch through the cipher. Rows are
    /// independent and processed in parallel.
    pub fn crypt_blocks(&self, blocks: ArrayView2<u8>, direction: Direction) -> Result<Array2<u8>> {
        check_block_width(&blocks, "cipher input")?;
        debug!("{direction:?}: {} blocks", blocks.nrows());

        let out: Vec<Block> = (0..blocks.nrows())
            .into_par_iter()
            .map(|d| {
                let mut block = row_to_block(blocks.row(d));
                self.crypt_block(&mut block, direction);
                block
            })
            .collect();

        Ok(Array2::from_shape_fn((out.len(), BLOCK_SIZE), |(d, i)| out[d][i]))
    }

    /// One block through the cipher with the byte-serial MixColumns, keeping
    /// every intermediate state and MixColumns intermediate. The configured
    /// form is ignored here.
    fn crypt_block_and_leak(
        &self,
        block: &mut Block,
        direction: Direction,
    ) -> (StateTrace, [ColumnLeaks; MIX_ROUNDS]) {
        let mut states = [[0u8; BLOCK_SIZE]; STATES];
        let mut leaks = [[[0u8; DECRYPT_LEAKS]; 4]; MIX_ROUNDS];

        match direction {
            Direction::Encrypt => {
                states[0] = *block;
                add_round_key(block, &self.key);
                states[1] = *block;

                for (i, round_key) in self.round_keys.iter().enumerate() {
                    sub_bytes(block, Direction::Encrypt);
                    states[2 + 4 * i] = *block;
                    shift_rows(block, Direction::Encrypt);
                    states[3 + 4 * i] = *block;

                    if i != ROUNDS - 1 {
                        mix_columns_serial(block, Direction::Encrypt, &mut leaks[i]);
                        states[4 + 4 * i] = *block;
                        add_round_key(block, round_key);
                        states[5 + 4 * i] = *block;
                    } else {
                        add_round_key(block, round_key);
                        states[4 + 4 * i] = *block;
                    }
                }
            }
            Direction::Decrypt => {
                states[STATES - 1] = *block;

                for (i, round_key) in self.round_keys.iter().enumerate().rev() {
                    add_round_key(block, round_key);
                    if i != ROUNDS - 1 {
                        states[4 + 4 * i] = *block;
                        mix_columns_serial(block, Direction::Decrypt, &mut leaks[i]);
                    }
                    states[3 + 4 * i] = *block;

                    shift_rows(block, Direction::Decrypt);
                    states[2 + 4 * i] = *block;
                    sub_bytes(block, Direction::Decrypt);
                    states[1 + 4 * i] = *block;
                }

                add_round_key(block, &self.key);
                states[0] = *block;
            }
        }

        (states, leaks)
    }

    /// Leak-capturing counterpart of [`Aes128::crypt_blocks`].
    pub fn crypt_blocks_and_leak(
        &self,
        blocks: ArrayView2<u8>,
        direction: Direction,
    ) -> Result<LeakCapture> {
        check_block_width(&blocks, "cipher input")?;
        let count = blocks.nrows();
        let leak_len = leak_count(direction);
        debug!("{direction:?} with leak capture: {count} blocks");

        let captured: Vec<_> = (0..count)
            .into_par_iter()
            .map(|d| {
                let mut block = row_to_block(blocks.row(d));
                let (states, leaks) = self.crypt_block_and_leak(&mut block, direction);
                (block, states, leaks)
            })
            .collect();

        let output = Array2::from_shape_fn((count, BLOCK_SIZE), |(d, i)| captured[d].0[i]);
        let states =
            Array3::from_shape_fn((STATES, count, BLOCK_SIZE), |(s, d, i)| captured[d].1[s][i]);
        let mix_column_leak = Array4::from_shape_fn(
            (MIX_ROUNDS, 4, count, leak_len),
            |(round, column, d, k)| captured[d].2[round][column][k],
        );

        Ok(LeakCapture {
            output,
            states,
            round_keys: self.round_keys,
            mix_column_leak,
        })
    }
}

/// Everything the leak-capturing cipher records for one batch.
#[derive(Debug, Clone)]
pub struct LeakCapture {
    /// `D x 16` ciphertext (or plaintext when decrypting).
    pub output: Array2<u8>,
    /// `41 x D x 16`, indexed as described on [`StateTrace`].
    pub states: Array3<u8>,
    pub round_keys: RoundKeys,
    /// `9 x 4 x D x n` as `[round][column][block][intermediate]`, with
    /// `n` = 9 encrypting and 18 decrypting.
    pub mix_column_leak: Array4<u8>,
}

impl LeakCapture {
    /// Bits flipped between the two captures, per state and block: `41 x D`.
    ///
    /// Comparing captures of two plaintexts under one key shows how a
    /// difference spreads through the rounds.
    pub fn state_distance(&self, other: &LeakCapture) -> Result<Array2<u32>> {
        if self.states.dim() != other.states.dim() {
            return Err(Error::Shape {
                context: "state distance block count",
                expected: self.states.len_of(Axis(1)),
                actual: other.states.len_of(Axis(1)),
            });
        }

        let flipped = Zip::from(&self.states)
            .and(&other.states)
            .map_collect(|&a, &b| a ^ b);
        Ok(flipped.map_axis(Axis(2), hamming_weight_total))
    }
}

pub fn crypt(blocks: ArrayView2<u8>, key: &[u8], direction: Direction) -> Result<Array2<u8>> {
    Aes128::new(key)?.crypt_blocks(blocks, direction)
}

pub fn encrypt(blocks: ArrayView2<u8>, key: &[u8]) -> Result<Array2<u8>> {
    crypt(blocks, key, Direction::Encrypt)
}

pub fn decrypt(blocks: ArrayView2<u8>, key: &[u8]) -> Result<Array2<u8>> {
    crypt(blocks, key, Direction::Decrypt)
}

pub fn crypt_and_leak(
    blocks: ArrayView2<u8>,
    key: &[u8],
    direction: Direction,
) -> Result<LeakCapture> {
    Aes128::new(key)?.crypt_blocks_and_leak(blocks, direction)
}

pub fn encrypt_and_leak(blocks: ArrayView2<u8>, key: &[u8]) -> Result<LeakCapture> {
    crypt_and_leak(blocks, key, Direction::Encrypt)
}

pub fn decrypt_and_leak(blocks: ArrayView2<u8>, key: &[u8]) -> Result<LeakCapture> {
    crypt_and_leak(blocks, key, Direction::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks_from_bytes;
    use ndarray::{s, Array2};
    use proptest::prelude::*;

    fn batch(hex: &str) -> Array2<u8> {
        blocks_from_bytes(&hex::decode(hex).unwrap()).unwrap()
    }

    fn key(hex: &str) -> Vec<u8> {
        hex::decode(hex).unwrap()
    }

    const FIPS_PT: &str = "00112233445566778899aabbccddeeff";
    const FIPS_KEY: &str = "000102030405060708090a0b0c0d0e0f";
    const FIPS_CT: &str = "69c4e0d86a7b0430d8cdb78070b4c55a";

    #[test]
    fn fips_197_appendix_c1() {
        let ct = encrypt(batch(FIPS_PT).view(), &key(FIPS_KEY)).unwrap();
        assert_eq!(hex::encode(ct.as_slice().unwrap()), FIPS_CT);

        let pt = decrypt(ct.view(), &key(FIPS_KEY)).unwrap();
        assert_eq!(hex::encode(pt.as_slice().unwrap()), FIPS_PT);
    }

    #[test]
    fn fips_197_appendix_b() {
        let ct = encrypt(
            batch("3243f6a8885a308d313198a2e0370734").view(),
            &key("2b7e151628aed2a6abf7158809cf4f3c"),
        )
        .unwrap();
        assert_eq!(
            hex::encode(ct.as_slice().unwrap()),
            "3925841d02dc09fbdc118597196a0b32"
        );
    }

    #[test]
    fn both_mix_column_forms_encrypt_the_same() {
        let k = key("2b7e151628aed2a6abf7158809cf4f3c");
        let closed = Aes128::new(&k).unwrap();
        let serial = Aes128::new(&k)
            .unwrap()
            .with_mix_columns(MixColumnsForm::ByteSerial);

        let mut a = *b"theblockbreakers";
        let mut b = a;
        closed.encrypt_block(&mut a);
        serial.encrypt_block(&mut b);
        assert_eq!(a, b);
        assert_eq!(hex::encode(a), "c69f25d0025a9ef32393f63e2f05b747");
    }

    #[test]
    fn blocks_in_a_batch_are_independent() {
        let k = key(FIPS_KEY);
        let blocks = batch(&format!("{FIPS_PT}{}{FIPS_PT}", "00".repeat(16)));
        let ct = encrypt(blocks.view(), &k).unwrap();

        assert_eq!(ct.row(0), ct.row(2));
        assert_eq!(hex::encode(ct.row(0).to_vec()), FIPS_CT);
        let single = encrypt(blocks.slice(s![1..2, ..]), &k).unwrap();
        assert_eq!(ct.row(1), single.row(0));
    }

    #[test]
    fn rejects_bad_shapes() {
        let blocks = Array2::<u8>::zeros((2, 15));
        assert!(matches!(
            encrypt(blocks.view(), &[0u8; 16]),
            Err(Error::Shape { expected: 16, actual: 15, .. })
        ));
        assert!(matches!(
            decrypt(batch(FIPS_PT).view(), &[0u8; 8]),
            Err(Error::Shape { actual: 8, .. })
        ));
    }

    #[test]
    fn leak_capture_matches_plain_cipher() {
        let k = key(FIPS_KEY);
        let blocks = batch(&format!("{FIPS_PT}{}", "a5".repeat(16)));

        for direction in [Direction::Encrypt, Direction::Decrypt] {
            let plain = crypt(blocks.view(), &k, direction).unwrap();
            let capture = crypt_and_leak(blocks.view(), &k, direction).unwrap();

            assert_eq!(capture.output, plain);
            assert_eq!(capture.states.dim(), (STATES, 2, 16));
            assert_eq!(capture.round_keys, expand_key(&k).unwrap());

            let (first, last) = match direction {
                Direction::Encrypt => (&blocks, &plain),
                Direction::Decrypt => (&plain, &blocks),
            };
            assert_eq!(capture.states.slice(s![0, .., ..]), first.view());
            assert_eq!(capture.states.slice(s![STATES - 1, .., ..]), last.view());
        }
    }

    #[test]
    fn state_progression_indices() {
        let k = key(FIPS_KEY);
        let capture = encrypt_and_leak(batch(FIPS_PT).view(), &k).unwrap();
        let state = |i: usize| hex::encode(capture.states.slice(s![i, 0, ..]).to_vec());

        // FIPS-197 appendix C.1, round 1
        assert_eq!(state(1), "00102030405060708090a0b0c0d0e0f0");
        assert_eq!(state(2), "63cab7040953d051cd60e0e7ba70e18c");
        assert_eq!(state(3), "6353e08c0960e104cd70b751bacad0e7");
        assert_eq!(state(4), "5f72641557f5bc92f7be3b291db9f91a");
        assert_eq!(state(5), "89d810e8855ace682d1843d8cb128fe4");
        // last round: SubBytes, ShiftRows, AddRoundKey
        assert_eq!(state(38), "7a9f102789d5f50b2beffd9f3dca4ea7");
        assert_eq!(state(39), "7ad5fda789ef4e272bca100b3d9ff59f");
        assert_eq!(state(40), FIPS_CT);
    }

    #[test]
    fn decryption_records_the_same_states() {
        let k = key(FIPS_KEY);
        let forward = encrypt_and_leak(batch(FIPS_PT).view(), &k).unwrap();
        let backward = decrypt_and_leak(forward.output.view(), &k).unwrap();

        assert_eq!(forward.states, backward.states);
        assert_eq!(forward.mix_column_leak.dim(), (MIX_ROUNDS, 4, 1, 9));
        assert_eq!(backward.mix_column_leak.dim(), (MIX_ROUNDS, 4, 1, 18));
    }

    #[test]
    fn mix_column_leak_follows_the_round_state() {
        let k = key(FIPS_KEY);
        let capture = encrypt_and_leak(batch(FIPS_PT).view(), &k).unwrap();

        for round in 0..MIX_ROUNDS {
            let pre_mix = capture.states.slice(s![3 + 4 * round, 0, ..]);
            for column in 0..4usize {
                let a: Vec<u8> = pre_mix.slice(s![4 * column..4 * column + 4]).to_vec();
                let leak: ndarray::ArrayView1<u8> = capture.mix_column_leak.slice(s![round, column, 0, ..]);
                assert_eq!(leak[0], a[0] ^ a[1] ^ a[2] ^ a[3]);
                assert_eq!(leak[1], a[0] ^ a[1]);
                assert_eq!(leak[7], a[3] ^ a[0]);
            }
        }
    }

    #[test]
    fn one_bit_difference_spreads_through_the_rounds() {
        let k = *b"Thats my Kung Fu";
        let a = blocks_from_bytes(b"Attack at 12:56!").unwrap();
        let b = blocks_from_bytes(b"Attack at 12:57!").unwrap();
        let a = encrypt_and_leak(a.view(), &k).unwrap();
        let b = encrypt_and_leak(b.view(), &k).unwrap();
        let distance = a.state_distance(&b).unwrap();

        assert_eq!(distance.dim(), (STATES, 1));
        assert_eq!(distance[[0, 0]], 1);
        assert_eq!(distance[[1, 0]], 1);
        // ShiftRows only moves the differing byte
        assert_eq!(distance[[3, 0]], distance[[2, 0]]);
        assert!(distance[[40, 0]] > 1);
        assert_eq!(a.state_distance(&a).unwrap().sum(), 0);
    }

    #[test]
    fn state_distance_needs_matching_batches() {
        let k = key(FIPS_KEY);
        let one = encrypt_and_leak(batch(FIPS_PT).view(), &k).unwrap();
        let two = encrypt_and_leak(Array2::<u8>::zeros((2, 16)).view(), &k).unwrap();
        assert!(matches!(
            one.state_distance(&two),
            Err(Error::Shape { expected: 1, actual: 2, .. })
        ));
    }

    proptest! {
        #[test]
        fn round_trip(
            pt in prop::array::uniform16(any::<u8>()),
            k in prop::array::uniform16(any::<u8>())
        ) {
            let cipher = Aes128::new(&k).unwrap();
            let mut block = pt;
            cipher.encrypt_block(&mut block);
            cipher.decrypt_block(&mut block);
            prop_assert_eq!(block, pt);

            cipher.decrypt_block(&mut block);
            cipher.encrypt_block(&mut block);
            prop_assert_eq!(block, pt);
        }
    }
}
