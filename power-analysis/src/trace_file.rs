/*
 *  File: trace_file.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! CSV trace sets: one row per capture, 16 plaintext bytes and 16 ciphertext
//! bytes in hex, then the power samples.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use log::info;
use ndarray::{s, Array2};

use crate::{Block, Error, Result, BLOCK_SIZE};

#[derive(Debug, Clone, PartialEq)]
pub struct TraceSet {
    pub plaintexts: Array2<u8>,
    pub ciphertexts: Array2<u8>,
    /// `D x T` power samples.
    pub traces: Array2<f64>,
}

impl TraceSet {
    pub fn len(&self) -> usize {
        self.traces.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.nrows() == 0
    }

    pub fn samples(&self) -> usize {
        self.traces.ncols()
    }

    /// Keeps only the first `samples` time samples of every trace.
    pub fn truncate(&mut self, samples: usize) {
        if samples < self.samples() {
            self.traces = self.traces.slice(s![.., ..samples]).to_owned();
        }
    }
}

fn parse_bytes<'a>(fields: impl Iterator<Item = &'a str>, row: usize) -> Result<Block> {
    let mut block = [0u8; BLOCK_SIZE];
    let mut count = 0;

    for (slot, field) in block.iter_mut().zip(fields) {
        let decoded = hex::decode(field.trim()).map_err(|e| Error::Parse {
            row,
            message: format!("byte {field:?}: {e}"),
        })?;
        *slot = match decoded.as_slice() {
            [b] => *b,
            _ => {
                return Err(Error::Parse {
                    row,
                    message: format!("{field:?} is not a single byte"),
                })
            }
        };
        count += 1;
    }

    if count != BLOCK_SIZE {
        return Err(Error::Parse {
            row,
            message: format!("expected {BLOCK_SIZE} bytes, found {count}"),
        });
    }
    Ok(block)
}

pub fn read_traces<R: Read>(reader: R) -> Result<TraceSet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut plaintexts = Vec::new();
    let mut ciphertexts = Vec::new();
    let mut samples = Vec::new();
    let mut width = None;

    for (row, result) in rdr.records().enumerate() {
        let record = result?;

        plaintexts.extend(parse_bytes(record.iter().take(BLOCK_SIZE), row)?);
        ciphertexts.extend(parse_bytes(record.iter().skip(BLOCK_SIZE).take(BLOCK_SIZE), row)?);

        let trace = record
            .iter()
            .skip(2 * BLOCK_SIZE)
            .map(|x| {
                x.trim().parse::<f64>().map_err(|e| Error::Parse {
                    row,
                    message: format!("sample {x:?}: {e}"),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        match width {
            None => width = Some(trace.len()),
            Some(w) if w != trace.len() => {
                return Err(Error::Parse {
                    row,
                    message: format!("expected {w} samples, found {}", trace.len()),
                })
            }
            _ => {}
        }
        samples.extend(trace);
    }

    let count = plaintexts.len() / BLOCK_SIZE;
    let width = width.unwrap_or(0);
    let actual = samples.len();
    let shape_error = |_| Error::Shape {
        context: "trace matrix",
        expected: count * width,
        actual,
    };

    Ok(TraceSet {
        plaintexts: Array2::from_shape_vec((count, BLOCK_SIZE), plaintexts).map_err(shape_error)?,
        ciphertexts: Array2::from_shape_vec((count, BLOCK_SIZE), ciphertexts)
            .map_err(shape_error)?,
        traces: Array2::from_shape_vec((count, width), samples).map_err(shape_error)?,
    })
}

pub fn read_trace_file<P: AsRef<Path>>(path: P) -> Result<TraceSet> {
    let path = path.as_ref();
    let set = read_traces(File::open(path)?)?;
    info!(
        "loaded {} traces x {} samples from {}",
        set.len(),
        set.samples(),
        path.display()
    );
    Ok(set)
}

pub fn write_traces<W: Write>(writer: W, set: &TraceSet) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let header: Vec<String> = (0..BLOCK_SIZE)
        .map(|i| format!("pt{i}"))
        .chain((0..BLOCK_SIZE).map(|i| format!("ct{i}")))
        .chain((0..set.samples()).map(|t| format!("t{t}")))
        .collect();
    wtr.write_record(&header)?;

    for ((pt, ct), trace) in set
        .plaintexts
        .rows()
        .into_iter()
        .zip(set.ciphertexts.rows())
        .zip(set.traces.rows())
    {
        let record: Vec<String> = pt
            .iter()
            .chain(ct.iter())
            .map(|b| hex::encode_upper([*b]))
            .chain(trace.iter().map(|v| v.to_string()))
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
