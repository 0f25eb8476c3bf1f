//! Proof-of-work puzzle core for the miner.
//!
//! This crate provides pure Rust implementations of:
//! - Compact difficulty ("bits") to 256-bit target conversion and back
//! - Block header serialization and double-SHA256 hashing
//! - Header validity checking against a target
//! - Exhaustive and bounded nonce search

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod difficulty;
pub mod hash;
pub mod network;
pub mod search;
pub mod validate;

pub use block::BlockHeader;
pub use difficulty::{bits_to_difficulty, bits_to_target, target_to_bits, Target};
pub use hash::{double_sha256, hash_to_display_hex, parse_display_hash};
pub use network::Network;
pub use search::{scan_range, ScanResult};
#[cfg(feature = "std")]
pub use search::{search, ExhaustionError, SearchProgress, Searcher, Solution};
pub use validate::{hash_meets_target, validate};
