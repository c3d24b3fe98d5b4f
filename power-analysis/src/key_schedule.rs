/*
 *  File: key_schedule.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! AES-128 key expansion.

use crate::gf::xtimes;
use crate::sbox::SBOX;
use crate::{key_block, Block, Error, Result};

pub const ROUNDS: usize = 10;

/// Round keys 0..=9. Entry `i` is the key added at the end of round `i`; the
/// master key itself is used for the initial whitening and is not included.
pub type RoundKeys = [Block; ROUNDS];

fn next_round_key(prev: &Block, rcon: u8) -> Block {
    let mut next = [0u8; 16];

    // RotWord + SubWord on the last word
    for i in 0..4 {
        next[i] = SBOX[prev[12 + (i + 1) % 4] as usize] ^ prev[i];
    }
    next[0] ^= rcon;

    for i in 4..16 {
        next[i] = next[i - 4] ^ prev[i];
    }

    next
}

/// Derives round key `round` (0..=9) from the master key, walking the schedule
/// from the start.
pub fn round_key(key: &[u8], round: usize) -> Result<Block> {
    if round >= ROUNDS {
        return Err(Error::Range {
            context: "round key index",
            value: round,
            limit: ROUNDS,
        });
    }

    let mut current = key_block(key)?;
    let mut rcon = 1u8;
    for _ in 0..=round {
        current = next_round_key(&current, rcon);
        rcon = xtimes(rcon);
    }

    Ok(current)
}

pub fn expand_key(key: &[u8]) -> Result<RoundKeys> {
    let mut current = key_block(key)?;
    let mut rcon = 1u8;
    let mut keys = [[0u8; 16]; ROUNDS];

    for slot in keys.iter_mut() {
        current = next_round_key(&current, rcon);
        *slot = current;
        rcon = xtimes(rcon);
    }

    Ok(keys)
}
