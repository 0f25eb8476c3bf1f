//! JSON-RPC backend talking to a full node.
//!
//! Uses the node's `getblockchaininfo` for chain state and
//! `generatetoaddress 1 <address> <maxtries>` to run bounded attempts.
//! Addresses come from the node wallet under the `mining` label.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::{AddressProvider, Backend, ChainState, GenerateOutcome};
use crate::config::MinerConfig;
use crate::error::{AddressError, BackendError};
use crate::tracing::prelude::*;

/// Wallet label for mining addresses.
pub const MINING_LABEL: &str = "mining";

/// Response envelope shared by every call.
#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Fields of `getblockchaininfo` the scheduler needs.
#[derive(Deserialize, Debug)]
struct BlockchainInfo {
    blocks: u64,
    difficulty: f64,
    bestblockhash: String,
}

/// Entry of `getaddressesbylabel`.
#[derive(Deserialize, Debug)]
struct LabeledAddress {
    purpose: String,
}

/// JSON-RPC client for a node.
pub struct RpcBackend {
    http: HttpClient,
    url: String,
    user: Option<String>,
    password: Option<String>,
    next_id: AtomicU64,
}

impl RpcBackend {
    /// Create a client for `url` with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(RpcBackend {
            http,
            url: url.into(),
            user: None,
            password: None,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a client from the miner configuration.
    pub fn from_config(config: &MinerConfig) -> Result<Self, BackendError> {
        let backend = Self::new(config.rpc_url(), config.rpc.timeout())?;
        Ok(match &config.rpc.user {
            Some(user) => backend.with_auth(user, config.rpc.password.clone().unwrap_or_default()),
            None => backend,
        })
    }

    /// Use HTTP basic authentication.
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        trace!(method, id, "RPC request");
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {}", method, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unavailable(format!(
                "{}: RPC authentication rejected ({})",
                method, status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {}", method, e)))?;

        parse_response(method, &text)
    }
}

/// Decode a JSON-RPC reply body.
///
/// Error objects and missing results are malformed from the scheduler's
/// point of view; the node answered but not with what was asked for.
fn parse_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, BackendError> {
    let envelope: RpcResponse<T> = serde_json::from_str(body)
        .map_err(|e| BackendError::MalformedResponse(format!("{}: {}", method, e)))?;

    if let Some(err) = envelope.error {
        return Err(BackendError::MalformedResponse(format!(
            "{} failed ({}): {}",
            method, err.code, err.message
        )));
    }

    envelope
        .result
        .ok_or_else(|| BackendError::MalformedResponse(format!("{}: missing result", method)))
}

fn outcome_from_hashes(hashes: Vec<String>) -> GenerateOutcome {
    match hashes.into_iter().next() {
        Some(hash) => GenerateOutcome::Found { hash },
        None => GenerateOutcome::NotFound,
    }
}

fn pick_receive_address(addresses: &BTreeMap<String, LabeledAddress>) -> Option<String> {
    addresses
        .iter()
        .find(|(_, info)| info.purpose == "receive")
        .map(|(address, _)| address.clone())
}

#[async_trait]
impl Backend for RpcBackend {
    async fn chain_state(&self) -> Result<ChainState, BackendError> {
        let info: BlockchainInfo = self.call("getblockchaininfo", json!([])).await?;
        Ok(ChainState {
            height: info.blocks,
            difficulty: info.difficulty,
            best_block_hash: info.bestblockhash,
        })
    }

    async fn generate_block(
        &self,
        address: &str,
        max_tries: u64,
    ) -> Result<GenerateOutcome, BackendError> {
        let hashes: Vec<String> = self
            .call("generatetoaddress", json!([1, address, max_tries]))
            .await?;
        Ok(outcome_from_hashes(hashes))
    }
}

#[async_trait]
impl AddressProvider for RpcBackend {
    async fn receiving_address(&self) -> Result<String, AddressError> {
        let labeled: Result<BTreeMap<String, LabeledAddress>, _> =
            self.call("getaddressesbylabel", json!([MINING_LABEL])).await;

        match labeled {
            Ok(addresses) => {
                if let Some(address) = pick_receive_address(&addresses) {
                    info!(address = %address, "Found existing mining address");
                    return Ok(address);
                }
            }
            Err(e @ BackendError::Unavailable(_)) => return Err(e.into()),
            // The node reports an unknown label as an RPC error
            Err(e) => debug!(error = %e, "No labeled mining address"),
        }

        info!("Creating new mining address");
        let address: String = self
            .call("getnewaddress", json!([MINING_LABEL, "legacy"]))
            .await?;

        if address.trim().is_empty() {
            return Err(AddressError::NoAddress);
        }
        info!(address = %address, "Created new mining address");
        Ok(address)
    }
}
