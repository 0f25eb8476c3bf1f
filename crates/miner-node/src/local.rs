//! In-process backend: a private chain tip mined on the blocking pool.
//!
//! Useful without a node (demos, integration tests). Each attempt builds a
//! header on the current tip whose merkle root commits to the reward
//! address and height, then scans up to `max_tries` nonces.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use miner_core::{bits_to_difficulty, double_sha256, hash_to_display_hex, scan_range, BlockHeader, Network};
use parking_lot::Mutex;

use crate::backend::{AddressProvider, Backend, ChainState, GenerateOutcome};
use crate::error::{AddressError, BackendError};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, Copy)]
struct Tip {
    height: u64,
    hash: [u8; 32],
    time: u32,
}

/// Backend that mines a local chain.
pub struct LocalBackend {
    network: Network,
    bits: u32,
    tip: Mutex<Tip>,
    addresses_issued: AtomicU64,
}

impl LocalBackend {
    /// Start from `network`'s genesis template at its genesis difficulty.
    pub fn new(network: Network) -> Self {
        let genesis = network.genesis_template();
        LocalBackend {
            network,
            bits: genesis.bits,
            tip: Mutex::new(Tip {
                height: 0,
                hash: genesis.hash(),
                time: genesis.time,
            }),
            addresses_issued: AtomicU64::new(0),
        }
    }

    /// Mine every block at `bits` instead of the genesis difficulty.
    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// The network whose parameters this chain uses.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Height of the local tip.
    pub fn height(&self) -> u64 {
        self.tip.lock().height
    }

    fn template(&self, tip: &Tip, address: &str) -> BlockHeader {
        let height = tip.height + 1;
        let mut commitment = Vec::with_capacity(address.len() + 8);
        commitment.extend_from_slice(address.as_bytes());
        commitment.extend_from_slice(&height.to_le_bytes());

        BlockHeader::new(tip.hash, double_sha256(&commitment), next_time(tip.time), self.bits)
    }
}

/// Block time: now, but strictly after the parent.
fn next_time(parent: u32) -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
        .unwrap_or(0);
    now.max(parent.saturating_add(1))
}

#[async_trait]
impl Backend for LocalBackend {
    async fn chain_state(&self) -> Result<ChainState, BackendError> {
        let tip = *self.tip.lock();
        Ok(ChainState {
            height: tip.height,
            difficulty: bits_to_difficulty(self.bits),
            best_block_hash: hash_to_display_hex(&tip.hash),
        })
    }

    async fn generate_block(
        &self,
        address: &str,
        max_tries: u64,
    ) -> Result<GenerateOutcome, BackendError> {
        let tip = *self.tip.lock();
        let header = self.template(&tip, address);
        let target = header.target();
        let template = header.serialize_without_nonce();

        let result = tokio::task::spawn_blocking(move || scan_range(&template, &target, 0, max_tries))
            .await
            .map_err(|e| BackendError::Unavailable(format!("search task failed: {}", e)))?;

        let hash = match result.hash {
            Some(hash) => hash,
            None => {
                trace!(hashes = result.hashes_computed, "Local attempt exhausted its budget");
                return Ok(GenerateOutcome::NotFound);
            }
        };

        let mut current = self.tip.lock();
        if current.hash != tip.hash {
            // Another session extended the tip while we were scanning.
            debug!(height = tip.height + 1, "Discarding stale local block");
            return Ok(GenerateOutcome::NotFound);
        }
        *current = Tip {
            height: tip.height + 1,
            hash,
            time: header.time,
        };

        Ok(GenerateOutcome::Found {
            hash: hash_to_display_hex(&hash),
        })
    }
}

#[async_trait]
impl AddressProvider for LocalBackend {
    async fn receiving_address(&self) -> Result<String, AddressError> {
        let n = self.addresses_issued.fetch_add(1, Ordering::Relaxed);
        let digest = double_sha256(&n.to_le_bytes());
        Ok(format!("{}-{}", self.network.name(), hex::encode(&digest[..20])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miner_core::{hash_meets_target, parse_display_hash};

    #[tokio::test]
    async fn test_regtest_blocks_extend_tip() {
        let backend = LocalBackend::new(Network::Regtest);
        let genesis = backend.chain_state().await.unwrap();
        assert_eq!(genesis.height, 0);

        let outcome = backend.generate_block("miner", 1_000_000).await.unwrap();
        let hash = match outcome {
            GenerateOutcome::Found { hash } => hash,
            GenerateOutcome::NotFound => panic!("regtest target should be easy"),
        };

        let state = backend.chain_state().await.unwrap();
        assert_eq!(state.height, 1);
        assert_eq!(state.best_block_hash, hash);
        assert_ne!(state.best_block_hash, genesis.best_block_hash);
    }

    #[tokio::test]
    async fn test_found_block_meets_target() {
        let backend = LocalBackend::new(Network::Regtest);
        backend.generate_block("miner", 1_000_000).await.unwrap();

        let found = backend.tip.lock().hash;
        let target = miner_core::bits_to_target(Network::Regtest.genesis_bits());
        assert!(hash_meets_target(&found, &target));
    }

    #[tokio::test]
    async fn test_address_commits_to_merkle_root() {
        let backend = LocalBackend::new(Network::Regtest);
        let tip = *backend.tip.lock();
        let a = backend.template(&tip, "alice");
        let b = backend.template(&tip, "bob");
        assert_ne!(a.merkle_root, b.merkle_root);
        assert_eq!(a.prev_block_hash, tip.hash);
        assert!(a.time > tip.time);
    }

    #[tokio::test]
    async fn test_hard_target_not_found() {
        // Difficulty-1 target: a handful of tries will not meet it.
        let backend = LocalBackend::new(Network::Regtest).with_bits(0x1d00ffff);
        let state = backend.chain_state().await.unwrap();
        assert_eq!(state.difficulty, 1.0);

        let outcome = backend.generate_block("miner", 16).await.unwrap();
        assert_eq!(outcome, GenerateOutcome::NotFound);
        assert_eq!(backend.height(), 0);

        let outcome = backend.generate_block("miner", 0).await.unwrap();
        assert_eq!(outcome, GenerateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_chain_state_hash_round_trips() {
        let backend = LocalBackend::new(Network::Mainnet);
        let state = backend.chain_state().await.unwrap();
        let internal = parse_display_hash(&state.best_block_hash).unwrap();
        assert_eq!(internal, backend.tip.lock().hash);
        assert_eq!(state.difficulty, 1.0);
    }

    #[tokio::test]
    async fn test_addresses_are_distinct() {
        let backend = LocalBackend::new(Network::Testnet);
        let a = backend.receiving_address().await.unwrap();
        let b = backend.receiving_address().await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("testnet-"));
        assert_eq!(a.len(), "testnet-".len() + 40);
    }

    #[test]
    fn test_next_time_is_monotonic() {
        assert!(next_time(0) > 0);
        assert_eq!(next_time(u32::MAX - 1), u32::MAX);
    }
}
