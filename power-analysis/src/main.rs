/*
 *  File: main.rs
 *  Author: Prasanna Paithankar (21CS30065)
 *  Date: 20/04/2025
 *
 *  Course: Hardware Security (CS60004) Spring 2025
 *  Assignment 2: AES Leakage and DPA/CPA Key Recovery
 *
 *  Refer to the README.md for other details.
 */

use std::fs::File;

use anyhow::{Context, Result};
use power_analysis::config::{Config, USAGE};
use power_analysis::simulate::{random_plaintexts, simulate_traces};
use power_analysis::trace_file::{read_trace_file, write_traces, TraceSet};
use power_analysis::{Analyzer, Block, BLOCK_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reads the trace file, or simulates a capture. Also returns the key when it
/// is known.
fn load_traces(config: &Config) -> Result<(TraceSet, Option<Block>)> {
    let Some(count) = config.simulate else {
        let set = read_trace_file(&config.trace_file)
            .with_context(|| format!("reading {}", config.trace_file.display()))?;
        return Ok((set, config.key));
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let key = config.key.unwrap_or_else(|| rng.gen());
    println!("Simulation key: {}", hex::encode_upper(key));

    let plaintexts = random_plaintexts(count, &mut rng);
    let set = simulate_traces(plaintexts.view(), &key, config.noise, &mut rng)?;

    if let Some(out) = &config.out {
        let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
        write_traces(file, &set)?;
        println!("Wrote {} traces to {}", set.len(), out.display());
    }
    Ok((set, Some(key)))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_args(std::env::args().skip(1)).context(USAGE)?;
    let (mut set, known_key) = load_traces(&config)?;
    if let Some(samples) = config.samples {
        set.truncate(samples);
    }

    let mut recovered = [0u8; BLOCK_SIZE];
    for index in config.key_bytes() {
        let analysis = Analyzer::new(index, config.mode)?
            .selection_bit(config.selection_bit)?
            .run(set.traces.view(), set.plaintexts.view())?;
        recovered[index] = analysis.key_byte;

        print!(
            "Recovered key byte {index}: {:02X} (sample {})",
            analysis.key_byte, analysis.leak_time
        );
        match known_key {
            Some(key) => println!(
                ", rank of true byte {:02X}: {}",
                key[index],
                analysis.rank(key[index])
            ),
            None => println!(),
        }
    }

    if config.key_byte.is_none() {
        println!("Recovered key: {}", hex::encode_upper(recovered));
    }
    Ok(())
}
