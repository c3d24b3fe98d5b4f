/*
 *  File: error.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Input dimensions do not match what the operation needs
    #[error("{context}: invalid shape (expected {expected}, got {actual})")]
    Shape {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unrecognised direction or analysis mode
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("{context}: {value} is out of range (must be below {limit})")]
    Range {
        context: &'static str,
        value: usize,
        limit: usize,
    },

    /// Noise half-width that uniform sampling cannot draw from
    #[error("noise amplitude {0} must be finite and non-negative")]
    Noise(f64),

    /// Every cell of the statistic came out NaN, so nothing can be selected
    #[error("degenerate statistics: {context}")]
    Degenerate { context: &'static str },

    #[error("trace file: {0}")]
    Csv(#[from] csv::Error),

    #[error("trace file row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("usage: {0}")]
    Usage(String),
}
