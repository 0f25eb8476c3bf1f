//! Genesis block miner: sweeps the nonce space of a network's genesis
//! template, bumping the timestamp whenever the space runs out.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use miner_core::difficulty::{expected_hashes, format_difficulty};
use miner_core::search::{Searcher, PROGRESS_INTERVAL};
use miner_core::{hash_to_display_hex, parse_display_hash, Network};
use miner_node::tracing::{self, prelude::*};

/// Mine a genesis block header
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Network whose genesis parameters to start from
    #[arg(short = 'n', long, default_value = "mainnet")]
    network: String,

    /// Override the header timestamp (Unix seconds)
    #[arg(short = 't', long)]
    time: Option<u32>,

    /// Override the compact target, hex (e.g. 1d00ffff)
    #[arg(short = 'b', long)]
    bits: Option<String>,

    /// Override the block version
    #[arg(long)]
    version: Option<i32>,

    /// Override the merkle root (display hex)
    #[arg(long)]
    merkle_root: Option<String>,

    /// Attempts between progress lines
    #[arg(long, default_value_t = PROGRESS_INTERVAL)]
    progress_interval: u64,
}

fn parse_bits(s: &str) -> Result<u32> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).with_context(|| format!("Invalid bits {:?}", s))
}

fn main() -> Result<()> {
    tracing::init_stdout();
    let args = Args::parse();

    let network = Network::from_str(&args.network)
        .ok_or_else(|| anyhow!("Unknown network {:?}", args.network))?;

    let mut header = network.genesis_template();
    if let Some(time) = args.time {
        header.time = time;
    }
    if let Some(bits) = &args.bits {
        header.bits = parse_bits(bits)?;
    }
    if let Some(version) = args.version {
        header.version = version;
    }
    if let Some(root) = &args.merkle_root {
        header.merkle_root = parse_display_hash(root)
            .map_err(|e| anyhow!("Invalid merkle root: {}", e))?;
    }

    let target = header.target();
    if target.is_zero() {
        bail!("Bits {:#010x} decode to an unsatisfiable zero target", header.bits);
    }

    info!(network = %network, "Mining genesis block");
    info!(
        target = %target,
        difficulty = %format_difficulty(target.difficulty()),
        expected_hashes = expected_hashes(target.difficulty()),
        "Target"
    );

    let searcher = Searcher::new().progress_interval(args.progress_interval);
    let solution = loop {
        let result = searcher.search(&header, &target, |progress| {
            info!(
                attempts = progress.attempts,
                elapsed_secs = progress.elapsed.as_secs(),
                "Tried {} nonces",
                progress.attempts
            );
        });

        match result {
            Ok(solution) => break solution,
            Err(exhausted) => {
                warn!(time = header.time, "{}", exhausted);
                header.time = header
                    .time
                    .checked_add(1)
                    .ok_or_else(|| anyhow!("Timestamp space exhausted"))?;
                info!(time = header.time, "Retrying with next timestamp");
            }
        }
    };

    info!(
        attempts = solution.attempts,
        elapsed_secs = solution.elapsed.as_secs_f64(),
        "Found valid genesis block"
    );
    println!("Nonce: {}", solution.nonce);
    println!("Hash: {}", hash_to_display_hex(&solution.hash));
    println!("Time: {}", solution.header.time);
    println!("Bits: {:#x}", solution.header.bits);

    Ok(())
}
