//! Difficulty-adaptive mining scheduler.
//!
//! The [`Scheduler`] runs one mining session against a [`Backend`]: either
//! a node over JSON-RPC ([`RpcBackend`]) or an in-process chain
//! ([`LocalBackend`]). Each cycle sizes a try-budget to the current
//! difficulty, randomizes it and a short start delay, and asks the backend
//! for one bounded attempt.

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod params;
pub mod rpc;
pub mod scheduler;
pub mod session;
pub mod tracing;

pub use backend::{AddressProvider, Backend, ChainState, GenerateOutcome, StaticAddress};
pub use config::{MinerConfig, RpcConfig, SchedulerConfig};
pub use error::{AddressError, BackendError, ConfigError};
pub use local::LocalBackend;
pub use params::{base_try_budget, MiningParameters, MAX_TRIES, MIN_TRIES};
pub use rpc::RpcBackend;
pub use scheduler::{CycleOutcome, CycleReport, MinerEvent, Scheduler};
pub use session::{format_hash_rate, MiningSession, SessionStats};
