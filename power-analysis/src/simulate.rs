/*
 *  File: simulate.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! Synthetic power traces from the leak-capturing cipher.
//!
//! Each trace has one sample per byte of the 41 recorded states (Hamming
//! weight) followed by one sample per MixColumns intermediate of the 9 mixing
//! rounds (Hamming weight), with uniform noise added on top.

use log::debug;
use ndarray::{s, Array2, ArrayView2};
use rand::Rng;

use crate::cipher::{encrypt_and_leak, MIX_ROUNDS, STATES};
use crate::leakage::hamming_weight;
use crate::mix_columns::ENCRYPT_LEAKS;
use crate::trace_file::TraceSet;
use crate::{Error, Result, BLOCK_SIZE};

const STATE_SAMPLES: usize = STATES * BLOCK_SIZE;
const MIX_SAMPLES: usize = MIX_ROUNDS * 4 * ENCRYPT_LEAKS;

pub const SAMPLES_PER_TRACE: usize = STATE_SAMPLES + MIX_SAMPLES;

/// Sample holding byte `byte` of state `state`.
pub fn state_sample(state: usize, byte: usize) -> usize {
    state * BLOCK_SIZE + byte
}

/// Sample holding MixColumns intermediate `index` of `column` in `round`.
pub fn mix_leak_sample(round: usize, column: usize, index: usize) -> usize {
    STATE_SAMPLES + (round * 4 + column) * ENCRYPT_LEAKS + index
}

pub fn random_plaintexts<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Array2<u8> {
    Array2::from_shape_simple_fn((count, BLOCK_SIZE), || rng.gen())
}

/// Accepts a noise half-width when the range `-noise..=noise` can be sampled:
/// finite, not negative, and with a finite width.
pub fn check_noise(noise: f64) -> Result<f64> {
    if noise.is_finite() && noise >= 0.0 && (2.0 * noise).is_finite() {
        Ok(noise)
    } else {
        Err(Error::Noise(noise))
    }
}

/// Encrypts `plaintexts` under `key` and turns every captured intermediate
/// into a sample. `noise` is the half-width of the uniform noise; 0 gives
/// exact Hamming weights.
pub fn simulate_traces<R: Rng + ?Sized>(
    plaintexts: ArrayView2<u8>,
    key: &[u8],
    noise: f64,
    rng: &mut R,
) -> Result<TraceSet> {
    let noise = check_noise(noise)?;
    let capture = encrypt_and_leak(plaintexts, key)?;
    let count = plaintexts.nrows();
    debug!("simulating {count} traces of {SAMPLES_PER_TRACE} samples, noise {noise}");

    let mut traces = Array2::<f64>::zeros((count, SAMPLES_PER_TRACE));
    for d in 0..count {
        let mut trace = traces.row_mut(d);

        for state in 0..STATES {
            for byte in 0..BLOCK_SIZE {
                trace[state_sample(state, byte)] =
                    hamming_weight(capture.states[[state, d, byte]]) as f64;
            }
        }

        for round in 0..MIX_ROUNDS {
            for column in 0..4 {
                let leak = capture.mix_column_leak.slice(s![round, column, d, ..]);
                for (index, &value) in leak.iter().enumerate() {
                    trace[mix_leak_sample(round, column, index)] = hamming_weight(value) as f64;
                }
            }
        }

        if noise > 0.0 {
            trace.mapv_inplace(|v| v + rng.gen_range(-noise..=noise));
        }
    }

    Ok(TraceSet {
        plaintexts: plaintexts.to_owned(),
        ciphertexts: capture.output,
        traces,
    })
}
