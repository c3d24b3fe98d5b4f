/*
 *  File: config.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

//! Command line options for the lab driver.

use std::path::PathBuf;

use crate::analysis::Mode;
use crate::simulate::check_noise;
use crate::{key_block, Block, Error, Result, BLOCK_SIZE};

pub const DEFAULT_TRACE_FILE: &str = "traces.csv";

pub const USAGE: &str = "power-analysis [TRACE_CSV] [--byte N] [--mode cpa|dpa] [--bit K] \
[--samples N] [--simulate N] [--noise X] [--key HEX] [--seed S] [--out PATH]";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub trace_file: PathBuf,
    /// `None` attacks all 16 bytes.
    pub key_byte: Option<usize>,
    pub mode: Mode,
    pub selection_bit: u8,
    /// Truncate traces to this many samples.
    pub samples: Option<usize>,
    /// Generate this many synthetic traces instead of reading `trace_file`.
    pub simulate: Option<usize>,
    pub noise: f64,
    /// Key to simulate with, and to rank guesses against.
    pub key: Option<Block>,
    pub seed: u64,
    /// Where to write simulated traces.
    pub out: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trace_file: PathBuf::from(DEFAULT_TRACE_FILE),
            key_byte: None,
            mode: Mode::Cpa,
            selection_bit: 0,
            samples: None,
            simulate: None,
            noise: 0.5,
            key: None,
            seed: 0,
            out: None,
        }
    }
}

fn number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Usage(format!("{flag} expects a number, got {value:?}")))
}

impl Config {
    /// Parses the arguments after the program name.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();
        let mut positional = None;

        while let Some(arg) = args.next() {
            if !arg.starts_with("--") {
                if positional.replace(PathBuf::from(&arg)).is_some() {
                    return Err(Error::Usage(format!("unexpected argument {arg:?}")));
                }
                continue;
            }

            let value = args
                .next()
                .ok_or_else(|| Error::Usage(format!("{arg} needs a value")))?;

            match arg.as_str() {
                "--byte" => {
                    let index: usize = number(&arg, &value)?;
                    if index >= BLOCK_SIZE {
                        return Err(Error::Range {
                            context: "key byte index",
                            value: index,
                            limit: BLOCK_SIZE,
                        });
                    }
                    config.key_byte = Some(index);
                }
                "--mode" => config.mode = value.parse()?,
                "--bit" => {
                    let bit: u8 = number(&arg, &value)?;
                    if bit >= 8 {
                        return Err(Error::Range {
                            context: "selection bit",
                            value: bit as usize,
                            limit: 8,
                        });
                    }
                    config.selection_bit = bit;
                }
                "--samples" => config.samples = Some(number(&arg, &value)?),
                "--simulate" => config.simulate = Some(number(&arg, &value)?),
                "--noise" => config.noise = check_noise(number(&arg, &value)?)?,
                "--key" => {
                    let bytes = hex::decode(&value)
                        .map_err(|e| Error::Usage(format!("--key is not hex: {e}")))?;
                    config.key = Some(key_block(&bytes)?);
                }
                "--seed" => config.seed = number(&arg, &value)?,
                "--out" => config.out = Some(PathBuf::from(value)),
                _ => return Err(Error::Usage(format!("unknown option {arg}"))),
            }
        }

        if let Some(path) = positional {
            config.trace_file = path;
        }
        Ok(config)
    }

    /// Byte positions to attack.
    pub fn key_bytes(&self) -> Vec<usize> {
        match self.key_byte {
            Some(index) => vec![index],
            None => (0..BLOCK_SIZE).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        Config::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.trace_file, PathBuf::from("traces.csv"));
        assert_eq!(config.key_bytes().len(), 16);
    }

    #[test]
    fn lab_settings() {
        let config = parse(&[
            "ws2.csv", "--byte", "12", "--mode", "DPA", "--samples", "30000", "--bit", "3",
        ])
        .unwrap();
        assert_eq!(config.trace_file, PathBuf::from("ws2.csv"));
        assert_eq!(config.key_bytes(), vec![12]);
        assert_eq!(config.mode, Mode::Dpa);
        assert_eq!(config.samples, Some(30000));
        assert_eq!(config.selection_bit, 3);
    }

    #[test]
    fn simulation_settings() {
        let config = parse(&[
            "--simulate", "200", "--noise", "0.1", "--seed", "9",
            "--key", "000102030405060708090a0b0c0d0e0f", "--out", "sim.csv",
        ])
        .unwrap();
        assert_eq!(config.simulate, Some(200));
        assert_eq!(config.noise, 0.1);
        assert_eq!(config.seed, 9);
        assert_eq!(config.key.unwrap()[15], 0x0f);
        assert_eq!(config.out, Some(PathBuf::from("sim.csv")));
    }

    #[test]
    fn errors() {
        assert!(matches!(parse(&["--byte", "16"]), Err(Error::Range { .. })));
        assert!(matches!(parse(&["--bit", "8"]), Err(Error::Range { .. })));
        assert!(matches!(parse(&["--mode", "spa"]), Err(Error::InvalidMode(_))));
        assert!(matches!(parse(&["--key", "0011"]), Err(Error::Shape { .. })));
        assert!(matches!(parse(&["--samples"]), Err(Error::Usage(_))));
        assert!(matches!(parse(&["--frobnicate", "1"]), Err(Error::Usage(_))));
        assert!(matches!(parse(&["a.csv", "b.csv"]), Err(Error::Usage(_))));
        assert!(matches!(parse(&["--byte", "x"]), Err(Error::Usage(_))));
    }

    #[test]
    fn noise_must_be_finite_and_non_negative() {
        for noise in ["inf", "NaN", "-0.5", "1e308"] {
            assert!(
                matches!(parse(&["--noise", noise]), Err(Error::Noise(_))),
                "--noise {noise}"
            );
        }
        assert_eq!(parse(&["--noise", "0"]).unwrap().noise, 0.0);
    }
}
