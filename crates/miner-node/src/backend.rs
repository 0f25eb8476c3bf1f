//! Collaborators the scheduler depends on: the mining backend that runs
//! bounded search attempts and reports chain state, and the wallet that
//! hands out receiving addresses.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AddressError, BackendError};

/// Read-only snapshot of the backend's chain tip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainState {
    /// Height of the best block.
    pub height: u64,
    /// Current network difficulty (1.0 = difficulty-1 target).
    pub difficulty: f64,
    /// Best block hash, display hex.
    pub best_block_hash: String,
}

/// Result of one bounded search attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerateOutcome {
    /// A block was found and accepted.
    Found {
        /// Block hash, display hex.
        hash: String,
    },
    /// The try-budget ran out without a valid header.
    NotFound,
}

/// Executes search attempts on the scheduler's behalf.
///
/// Implementations must tolerate concurrent calls from independent
/// sessions.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current chain tip and difficulty.
    async fn chain_state(&self) -> Result<ChainState, BackendError>;

    /// Try up to `max_tries` nonces for a block paying `address`.
    async fn generate_block(
        &self,
        address: &str,
        max_tries: u64,
    ) -> Result<GenerateOutcome, BackendError>;
}

/// Source of receiving addresses for block rewards.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Return an existing receiving address or create a new one.
    async fn receiving_address(&self) -> Result<String, AddressError>;
}

/// A fixed address, for when the operator names one explicitly.
#[derive(Debug, Clone)]
pub struct StaticAddress(pub String);

#[async_trait]
impl AddressProvider for StaticAddress {
    async fn receiving_address(&self) -> Result<String, AddressError> {
        if self.0.trim().is_empty() {
            return Err(AddressError::NoAddress);
        }
        Ok(self.0.clone())
    }
}
