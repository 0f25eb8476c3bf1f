//! Nonce search over a fixed header template.
//!
//! [`Searcher`] sweeps the whole 32-bit nonce space (genesis bootstrap).
//! [`scan_range`] checks a bounded window and is what a backend runs on a
//! scheduler's behalf.

use crate::block::BlockHeader;
use crate::difficulty::Target;
use crate::hash::double_sha256;
use crate::validate::hash_meets_target;

/// Attempts between progress notifications.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Result of a bounded nonce scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// The nonce that produced a valid hash (if found).
    pub nonce: Option<u32>,
    /// The valid block hash (if found).
    pub hash: Option<[u8; 32]>,
    /// Number of hashes computed in this batch.
    pub hashes_computed: u64,
}

impl ScanResult {
    /// Create a result indicating no match found.
    pub fn not_found(hashes: u64) -> Self {
        ScanResult {
            nonce: None,
            hash: None,
            hashes_computed: hashes,
        }
    }

    /// Create a result indicating a valid block was found.
    pub fn found(nonce: u32, hash: [u8; 32], hashes: u64) -> Self {
        ScanResult {
            nonce: Some(nonce),
            hash: Some(hash),
            hashes_computed: hashes,
        }
    }

    /// Whether a valid nonce was found.
    pub fn is_found(&self) -> bool {
        self.nonce.is_some()
    }
}

/// Scan up to `nonce_count` nonces starting at `nonce_start`.
///
/// Stops at the first nonce whose header hash meets `target`. Never goes
/// past `u32::MAX`, so fewer than `nonce_count` hashes may be computed.
pub fn scan_range(
    header_without_nonce: &[u8; 76],
    target: &Target,
    nonce_start: u32,
    nonce_count: u64,
) -> ScanResult {
    if nonce_count == 0 {
        return ScanResult::not_found(0);
    }

    let mut header = [0u8; 80];
    header[..76].copy_from_slice(header_without_nonce);

    let last = (nonce_start as u64)
        .saturating_add(nonce_count - 1)
        .min(u32::MAX as u64) as u32;

    for nonce in nonce_start..=last {
        header[76..80].copy_from_slice(&nonce.to_le_bytes());
        let hash = double_sha256(&header);

        if hash_meets_target(&hash, target) {
            return ScanResult::found(nonce, hash, (nonce - nonce_start) as u64 + 1);
        }
    }

    ScanResult::not_found((last - nonce_start) as u64 + 1)
}

#[cfg(feature = "std")]
pub use exhaustive::*;

#[cfg(feature = "std")]
mod exhaustive {
    use super::*;
    use std::time::{Duration, Instant};

    /// Progress snapshot passed to the observer callback.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SearchProgress {
        /// Nonces tried so far.
        pub attempts: u64,
        /// Wall-clock time since the search began.
        pub elapsed: Duration,
    }

    /// A header that meets its target.
    #[derive(Debug, Clone)]
    pub struct Solution {
        /// The template with the winning nonce filled in.
        pub header: BlockHeader,
        /// The winning nonce.
        pub nonce: u32,
        /// Block hash, internal byte order.
        pub hash: [u8; 32],
        /// Nonces tried including the winner.
        pub attempts: u64,
        /// Wall-clock time spent.
        pub elapsed: Duration,
    }

    /// The nonce space ran out without a valid header.
    ///
    /// The caller must change another header field (usually `time`) and
    /// search again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExhaustionError {
        /// Nonces tried.
        pub attempts: u64,
        /// Wall-clock time spent.
        pub elapsed: Duration,
    }

    impl std::fmt::Display for ExhaustionError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(
                f,
                "Nonce space exhausted after {} attempts in {:.1}s",
                self.attempts,
                self.elapsed.as_secs_f64()
            )
        }
    }

    impl std::error::Error for ExhaustionError {}

    /// Exhaustive nonce searcher.
    #[derive(Debug, Clone)]
    pub struct Searcher {
        progress_interval: u64,
        start_nonce: u32,
    }

    impl Default for Searcher {
        fn default() -> Self {
            Searcher {
                progress_interval: PROGRESS_INTERVAL,
                start_nonce: 0,
            }
        }
    }

    impl Searcher {
        /// Searcher starting at nonce 0 with the default progress interval.
        pub fn new() -> Self {
            Self::default()
        }

        /// Report progress every `interval` attempts (0 disables reporting).
        pub fn progress_interval(mut self, interval: u64) -> Self {
            self.progress_interval = interval;
            self
        }

        /// Begin the sweep at `nonce` instead of 0.
        pub fn start_nonce(mut self, nonce: u32) -> Self {
            self.start_nonce = nonce;
            self
        }

        /// Sweep nonces upward until one validates or the space runs out.
        ///
        /// Only the nonce varies; the rest of `template` is used as-is.
        pub fn search<F>(
            &self,
            template: &BlockHeader,
            target: &Target,
            mut on_progress: F,
        ) -> Result<Solution, ExhaustionError>
        where
            F: FnMut(SearchProgress),
        {
            let started = Instant::now();
            let mut header = [0u8; 80];
            header[..76].copy_from_slice(&template.serialize_without_nonce());

            let mut attempts = 0u64;

            for nonce in self.start_nonce..=u32::MAX {
                header[76..80].copy_from_slice(&nonce.to_le_bytes());
                let hash = double_sha256(&header);
                attempts += 1;

                if hash_meets_target(&hash, target) {
                    let mut solved = template.clone();
                    solved.nonce = nonce;
                    return Ok(Solution {
                        header: solved,
                        nonce,
                        hash,
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }

                if self.progress_interval != 0 && attempts % self.progress_interval == 0 {
                    on_progress(SearchProgress {
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
            }

            Err(ExhaustionError {
                attempts,
                elapsed: started.elapsed(),
            })
        }
    }

    /// Sweep the full nonce space of `template` from 0.
    pub fn search<F>(
        template: &BlockHeader,
        target: &Target,
        on_progress: F,
    ) -> Result<Solution, ExhaustionError>
    where
        F: FnMut(SearchProgress),
    {
        Searcher::new().search(template, target, on_progress)
    }
}
