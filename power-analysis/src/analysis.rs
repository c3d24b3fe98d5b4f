/*
 *  File: analysis.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! DPA and CPA recovery of a single AES-128 key byte.
//!
//! For each of the 256 guesses `g` at key position `k`, every input `d` gets a
//! predicted leakage `model(SBOX[plaintext[d][k] ^ g])`. The prediction rows
//! are then compared against every time sample of the traces: DPA takes the
//! difference of the mean traces of the two groups the selection bit splits
//! the inputs into, CPA takes the Pearson correlation of the Hamming weight
//! with the samples.
//!
//! Degenerate cells (a constant trace column, a constant prediction row or an
//! empty DPA group) are NaN and can never be selected.

use std::str::FromStr;

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::leakage::LeakageModel;
use crate::sbox::SBOX;
use crate::{Block, Error, Result, BLOCK_SIZE};

/// Number of key hypotheses per byte.
pub const HYPOTHESES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Difference of means, split on one bit of the S-box output.
    Dpa,
    /// Pearson correlation with the Hamming weight of the S-box output.
    Cpa,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dpa" => Ok(Mode::Dpa),
            "cpa" => Ok(Mode::Cpa),
            _ => Err(Error::InvalidMode(format!("analysis mode {s:?}"))),
        }
    }
}

/// Lab-script encoding: `DPA = 0`, `CPA = 1`.
impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(Mode::Dpa),
            1 => Ok(Mode::Cpa),
            other => Err(Error::InvalidMode(format!("analysis flag {other}"))),
        }
    }
}

/// Result of attacking one key byte.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// `256 x D` predicted leakage per guess and input.
    pub classification: Array2<u8>,
    /// `256 x T` statistic per guess and time sample.
    pub output: Array2<f64>,
    pub key_byte: u8,
    pub leak_time: usize,
}

impl Analysis {
    /// Largest |statistic| of each guess over all time samples, NaN for guesses
    /// whose row is entirely NaN.
    pub fn peaks(&self) -> Array1<f64> {
        self.output
            .map_axis(Axis(1), |row| *row.mapv(f64::abs).max_skipnan())
    }

    /// How many guesses beat `key_byte` on their peak. 0 means it would have
    /// been recovered (ties aside).
    pub fn rank(&self, key_byte: u8) -> usize {
        let peaks = self.peaks();
        let target = peaks[key_byte as usize];
        peaks
            .iter()
            .filter(|&&p| p > target || (target.is_nan() && !p.is_nan()))
            .count()
    }
}

/// Index of the largest non-NaN value. On ties the lowest index wins; this is
/// only a deterministic choice, not a statement about which guess is right.
fn first_argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if b >= v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Zero mean, unit (population) variance. `None` when the input is constant.
fn standardize(values: ArrayView1<f64>) -> Option<Array1<f64>> {
    let first = *values.first()?;
    if values.iter().all(|&v| v == first) {
        return None;
    }

    let mean = values.mean()?;
    let std = values.std(0.0);
    if std == 0.0 || !std.is_finite() {
        return None;
    }

    Some(values.mapv(|v| (v - mean) / std))
}

fn standardize_columns(traces: ArrayView2<f64>) -> Array2<f64> {
    let mut standardized = Array2::from_elem(traces.dim(), f64::NAN);
    let mut constant = 0usize;

    for (mut dst, src) in standardized.columns_mut().into_iter().zip(traces.columns()) {
        match standardize(src) {
            Some(z) => dst.assign(&z),
            None => constant += 1,
        }
    }

    if constant > 0 {
        warn!("{constant} of {} trace samples are constant", traces.ncols());
    }
    standardized
}

fn correlation_row(prediction: ArrayView1<u8>, standardized: &Array2<f64>) -> Array1<f64> {
    let prediction = prediction.mapv(f64::from);
    match standardize(prediction.view()) {
        Some(z) => standardized.t().dot(&z) / standardized.nrows() as f64,
        None => Array1::from_elem(standardized.ncols(), f64::NAN),
    }
}

fn mean_difference_row(selection: ArrayView1<u8>, traces: ArrayView2<f64>) -> Array1<f64> {
    let samples = traces.ncols();
    let mut sums = [Array1::<f64>::zeros(samples), Array1::<f64>::zeros(samples)];
    let mut counts = [0usize; 2];

    for (&group, trace) in selection.iter().zip(traces.rows()) {
        let group = usize::from(group != 0);
        sums[group].scaled_add(1.0, &trace);
        counts[group] += 1;
    }

    if counts.contains(&0) {
        return Array1::from_elem(samples, f64::NAN);
    }

    let [zeros, ones] = sums;
    ones / counts[1] as f64 - zeros / counts[0] as f64
}

/// Welch's t-statistic per time sample between the traces whose `groups`
/// entry is non-zero and the rest: `(m1 - m0) / sqrt(v1/n1 + v0/n0)` with
/// sample variances. Samples where either group has fewer than two traces, or
/// both groups are constant, are NaN.
pub fn welch_t(traces: ArrayView2<f64>, groups: ArrayView1<u8>) -> Result<Array1<f64>> {
    if groups.len() != traces.nrows() {
        return Err(Error::Shape {
            context: "welch t group labels",
            expected: traces.nrows(),
            actual: groups.len(),
        });
    }

    let (ones, zeros): (Vec<usize>, Vec<usize>) =
        (0..groups.len()).partition(|&d| groups[d] != 0);
    if ones.len() < 2 || zeros.len() < 2 {
        debug!("welch t: groups of {} and {} traces", zeros.len(), ones.len());
        return Ok(Array1::from_elem(traces.ncols(), f64::NAN));
    }

    let moments = |rows: &[usize]| {
        let group = traces.select(Axis(0), rows);
        let n = rows.len() as f64;
        (group.sum_axis(Axis(0)) / n, group.var_axis(Axis(0), 1.0) / n)
    };
    let (mean1, scaled_var1) = moments(&ones);
    let (mean0, scaled_var0) = moments(&zeros);

    let mut t = mean1 - mean0;
    for (cell, spread) in t.iter_mut().zip(scaled_var1 + scaled_var0) {
        *cell = if spread > 0.0 { *cell / spread.sqrt() } else { f64::NAN };
    }
    Ok(t)
}

/// A configured attack on one key byte.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    key_byte_index: usize,
    mode: Mode,
    selection_bit: u8,
}

impl Analyzer {
    pub fn new(key_byte_index: usize, mode: Mode) -> Result<Self> {
        if key_byte_index >= BLOCK_SIZE {
            return Err(Error::Range {
                context: "key byte index",
                value: key_byte_index,
                limit: BLOCK_SIZE,
            });
        }

        Ok(Self {
            key_byte_index,
            mode,
            selection_bit: 0,
        })
    }

    /// Bit of the S-box output DPA splits on. Defaults to 0.
    pub fn selection_bit(mut self, bit: u8) -> Result<Self> {
        if bit >= 8 {
            return Err(Error::Range {
                context: "selection bit",
                value: bit as usize,
                limit: 8,
            });
        }
        self.selection_bit = bit;
        Ok(self)
    }

    pub fn leakage_model(&self) -> LeakageModel {
        match self.mode {
            Mode::Dpa => LeakageModel::Bit(self.selection_bit),
            Mode::Cpa => LeakageModel::HammingWeight,
        }
    }

    /// `256 x D` matrix of predicted leakage for every guess and input.
    pub fn classify(&self, plaintexts: ArrayView2<u8>) -> Result<Array2<u8>> {
        if plaintexts.ncols() != BLOCK_SIZE {
            return Err(Error::Shape {
                context: "plaintext width",
                expected: BLOCK_SIZE,
                actual: plaintexts.ncols(),
            });
        }

        let model = self.leakage_model();
        let column = plaintexts.column(self.key_byte_index);
        Ok(Array2::from_shape_fn(
            (HYPOTHESES, plaintexts.nrows()),
            |(guess, d)| model.predict(SBOX[(column[d] ^ guess as u8) as usize]),
        ))
    }

    pub fn run(&self, traces: ArrayView2<f64>, plaintexts: ArrayView2<u8>) -> Result<Analysis> {
        if traces.nrows() != plaintexts.nrows() {
            return Err(Error::Shape {
                context: "trace count vs plaintext count",
                expected: plaintexts.nrows(),
                actual: traces.nrows(),
            });
        }
        if traces.nrows() == 0 || traces.ncols() == 0 {
            return Err(Error::Shape {
                context: "trace set is empty",
                expected: 1,
                actual: 0,
            });
        }

        let classification = self.classify(plaintexts)?;
        debug!(
            "{:?} on key byte {}: {} traces x {} samples",
            self.mode,
            self.key_byte_index,
            traces.nrows(),
            traces.ncols()
        );

        let rows: Vec<Array1<f64>> = match self.mode {
            Mode::Cpa => {
                let standardized = standardize_columns(traces);
                (0..HYPOTHESES)
                    .into_par_iter()
                    .map(|guess| correlation_row(classification.row(guess), &standardized))
                    .collect()
            }
            Mode::Dpa => (0..HYPOTHESES)
                .into_par_iter()
                .map(|guess| mean_difference_row(classification.row(guess), traces))
                .collect(),
        };

        let mut output = Array2::zeros((HYPOTHESES, traces.ncols()));
        for (mut dst, row) in output.rows_mut().into_iter().zip(&rows) {
            dst.assign(row);
        }

        let degenerate = rows.iter().filter(|r| r.iter().all(|v| v.is_nan())).count();
        if degenerate > 0 {
            warn!("{degenerate} key guesses have no defined statistic");
        }

        let magnitude = output.mapv(f64::abs);
        let column_peaks = magnitude.map_axis(Axis(0), |column| *column.max_skipnan());
        let leak_time = first_argmax(&column_peaks).ok_or(Error::Degenerate {
            context: "no time sample has a defined statistic",
        })?;
        let key_byte = first_argmax(magnitude.column(leak_time)).ok_or(Error::Degenerate {
            context: "no key guess has a defined statistic",
        })? as u8;

        info!(
            "key byte {} = {key_byte:#04x} at sample {leak_time} (|stat| {:.4})",
            self.key_byte_index, column_peaks[leak_time]
        );

        Ok(Analysis {
            classification,
            output,
            key_byte,
            leak_time,
        })
    }
}

pub fn analyze(
    traces: ArrayView2<f64>,
    plaintexts: ArrayView2<u8>,
    key_byte_index: usize,
    mode: Mode,
) -> Result<Analysis> {
    Analyzer::new(key_byte_index, mode)?.run(traces, plaintexts)
}

/// Attacks all 16 positions independently.
pub fn recover_key(
    traces: ArrayView2<f64>,
    plaintexts: ArrayView2<u8>,
    mode: Mode,
) -> Result<Block> {
    let mut key = [0u8; BLOCK_SIZE];
    for (index, slot) in key.iter_mut().enumerate() {
        *slot = analyze(traces, plaintexts, index, mode)?.key_byte;
    }
    Ok(key)
}
