//! Mining daemon: runs the adaptive scheduler until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};

use miner_core::difficulty::format_difficulty;
use miner_core::Network;
use miner_node::tracing::{self, prelude::*};
use miner_node::{
    format_hash_rate, AddressProvider, Backend, CycleOutcome, LocalBackend, MinerConfig,
    MinerEvent, RpcBackend, Scheduler, StaticAddress,
};

/// Difficulty-adaptive block miner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Network (mainnet, testnet, regtest)
    #[arg(short = 'n', long)]
    network: Option<String>,

    /// Node RPC URL (default: localhost on the network's port)
    #[arg(long)]
    rpc_url: Option<String>,

    /// RPC user name
    #[arg(long)]
    user: Option<String>,

    /// RPC password
    #[arg(long)]
    password: Option<String>,

    /// Mine to this address instead of the wallet's mining address
    #[arg(short = 'a', long)]
    address: Option<String>,

    /// Mine an in-process chain instead of talking to a node
    #[arg(long)]
    local: bool,

    /// Ask the wallet for a new address before every attempt
    #[arg(long)]
    fresh_address: bool,

    /// Seed for budget and delay randomization
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<(MinerConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => MinerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MinerConfig::default(),
        };

        if self.network.is_some() {
            config.network = self.network;
        }
        if self.rpc_url.is_some() {
            config.rpc.url = self.rpc_url;
        }
        if self.user.is_some() {
            config.rpc.user = self.user;
        }
        if self.password.is_some() {
            config.rpc.password = self.password;
        }
        if self.address.is_some() {
            config.address = self.address;
        }
        if self.fresh_address {
            config.scheduler.fresh_address_per_cycle = true;
        }
        if self.seed.is_some() {
            config.scheduler.seed = self.seed;
        }

        config.validate()?;
        Ok((config, self.local))
    }
}

fn backends(config: &MinerConfig, local: bool) -> Result<(Arc<dyn Backend>, Arc<dyn AddressProvider>)> {
    let network: Network = config.network();
    if local {
        info!(network = %network, "Mining in-process chain");
        let chain = Arc::new(LocalBackend::new(network));
        let backend: Arc<dyn Backend> = chain.clone();
        let wallet: Arc<dyn AddressProvider> = chain;
        return Ok((backend, wallet));
    }

    let node = Arc::new(RpcBackend::from_config(config)?);
    info!(network = %network, url = node.url(), "Mining via node RPC");
    let backend: Arc<dyn Backend> = node.clone();
    let wallet: Arc<dyn AddressProvider> = node;
    Ok((backend, wallet))
}

async fn render_events(mut events: broadcast::Receiver<MinerEvent>) {
    loop {
        match events.recv().await {
            Ok(MinerEvent::Cycle(report)) => match &report.outcome {
                CycleOutcome::BackendError { message } => {
                    debug!(round = report.round, error = %message, "Cycle failed");
                }
                _ => info!(
                    round = report.round,
                    max_tries = report.max_tries,
                    difficulty = %format_difficulty(report.difficulty),
                    total_attempts = report.total_attempts,
                    blocks_found = report.blocks_found,
                    hash_rate = %format_hash_rate(report.hash_rate),
                    "Cycle complete"
                ),
            },
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => warn!(missed, "Event display fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_stdout();

    let (config, local) = Args::parse().into_config()?;
    let (backend, wallet) = backends(&config, local)?;

    let scheduler = Scheduler::new(backend, config.scheduler.clone())
        .with_address_provider(wallet.clone());
    let display = tokio::spawn(render_events(scheduler.subscribe()));

    let started = match &config.address {
        Some(address) => scheduler.start_from(&StaticAddress(address.clone())).await,
        None => scheduler.start_from(wallet.as_ref()).await,
    };
    started.context("Unable to get or create mining address")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    let last_rate = scheduler.stats().hash_rate;
    scheduler.shutdown().await;
    let stats = scheduler.stats();
    drop(scheduler);
    let _ = display.await;

    println!("Total attempts: {}", stats.total_attempts);
    println!("Blocks found:   {}", stats.blocks_found);
    println!("Last rate:      {}", format_hash_rate(last_rate));
    if let Some(hash) = &stats.last_block_hash {
        println!("Last block:     {}", hash);
    }

    Ok(())
}
