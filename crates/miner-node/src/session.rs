//! Mining session state and the snapshot exposed to observers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Mutable state of one mining session.
///
/// Only the scheduler's cycle logic and its start/stop operations mutate
/// this; everyone else reads [`SessionStats`] snapshots.
#[derive(Debug, Clone, Default)]
pub struct MiningSession {
    /// Whether the session is mining.
    pub active: bool,
    /// Try-budget of every completed backend call since start.
    pub total_attempts: u64,
    /// Blocks found since start.
    pub blocks_found: u64,
    /// Requested tries per second over the last completed cycle.
    pub hash_rate: f64,
    /// Address the current attempts pay to.
    pub address: Option<String>,
    /// Cycles begun since start.
    pub round: u64,
    /// Hash of the most recent block found.
    pub last_block_hash: Option<String>,
    started_at: Option<Instant>,
}

impl MiningSession {
    /// Create an inactive session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset counters and mark the session active.
    pub fn begin(&mut self, address: String) {
        *self = MiningSession {
            active: true,
            address: Some(address),
            started_at: Some(Instant::now()),
            ..MiningSession::default()
        };
    }

    /// Mark the session inactive, keeping the totals.
    pub fn end(&mut self) {
        self.active = false;
        self.hash_rate = 0.0;
    }

    /// Advance and return the round counter.
    pub fn next_round(&mut self) -> u64 {
        self.round += 1;
        self.round
    }

    /// Count a completed attempt that found nothing.
    pub fn record_not_found(&mut self, max_tries: u64) {
        self.total_attempts = self.total_attempts.saturating_add(max_tries);
    }

    /// Count a completed attempt that found a block.
    pub fn record_found(&mut self, max_tries: u64, hash: &str) {
        self.total_attempts = self.total_attempts.saturating_add(max_tries);
        self.blocks_found += 1;
        self.last_block_hash = Some(hash.to_string());
    }

    /// Update the rate estimate from a finished cycle.
    ///
    /// This is the requested budget over wall-clock time, not measured
    /// throughput: the backend may stop early when it finds a block.
    /// Ignored once the session has ended, so a call that settles after
    /// stop leaves the rate at zero.
    pub fn record_rate(&mut self, max_tries: u64, elapsed: Duration) {
        if !self.active {
            return;
        }
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.hash_rate = max_tries as f64 / secs;
        }
    }

    /// Copy out a consistent view for display.
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            active: self.active,
            total_attempts: self.total_attempts,
            blocks_found: self.blocks_found,
            hash_rate: self.hash_rate,
            round: self.round,
            address: self.address.clone(),
            last_block_hash: self.last_block_hash.clone(),
            uptime_secs: self
                .started_at
                .filter(|_| self.active)
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0),
        }
    }
}

/// Point-in-time session statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub active: bool,
    pub total_attempts: u64,
    pub blocks_found: u64,
    /// Requested tries per second (approximate).
    pub hash_rate: f64,
    pub round: u64,
    pub address: Option<String>,
    pub last_block_hash: Option<String>,
    pub uptime_secs: u64,
}

impl SessionStats {
    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        format_hash_rate(self.hash_rate)
    }
}

/// Format a tries-per-second figure with a unit suffix.
pub fn format_hash_rate(rate: f64) -> String {
    if rate >= 1_000_000_000.0 {
        format!("{:.2} GH/s", rate / 1_000_000_000.0)
    } else if rate >= 1_000_000.0 {
        format!("{:.2} MH/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.2} KH/s", rate / 1_000.0)
    } else {
        format!("{:.2} H/s", rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_resets_counters() {
        let mut session = MiningSession::new();
        session.begin("a".into());
        session.next_round();
        session.record_found(5, "00ff");
        session.end();

        session.begin("b".into());
        let stats = session.snapshot();
        assert!(stats.active);
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.blocks_found, 0);
        assert_eq!(stats.round, 0);
        assert_eq!(stats.address.as_deref(), Some("b"));
        assert_eq!(stats.last_block_hash, None);
    }

    #[test]
    fn test_counters() {
        let mut session = MiningSession::new();
        session.begin("a".into());
        session.record_not_found(1_000_000);
        session.record_found(2_000_000, "abcd");
        session.record_not_found(3_000_000);

        let stats = session.snapshot();
        assert_eq!(stats.total_attempts, 6_000_000);
        assert_eq!(stats.blocks_found, 1);
        assert_eq!(stats.last_block_hash.as_deref(), Some("abcd"));
    }

    #[test]
    fn test_rate_estimate() {
        let mut session = MiningSession::new();
        session.begin("a".into());
        session.record_rate(10_000_000, Duration::from_secs(2));
        assert_eq!(session.hash_rate, 5_000_000.0);

        // Zero-length cycles leave the previous estimate
        session.record_rate(1, Duration::ZERO);
        assert_eq!(session.hash_rate, 5_000_000.0);

        session.end();
        assert_eq!(session.hash_rate, 0.0);
        assert!(!session.active);

        // A call settling after stop does not revive the estimate
        session.record_rate(10_000_000, Duration::from_secs(1));
        assert_eq!(session.hash_rate, 0.0);
    }

    #[test]
    fn test_format_hash_rate() {
        let mut stats = SessionStats::default();
        stats.hash_rate = 5_000_000.0;
        assert_eq!(stats.format_hash_rate(), "5.00 MH/s");
        stats.hash_rate = 1_500.0;
        assert_eq!(stats.format_hash_rate(), "1.50 KH/s");
        stats.hash_rate = 12.0;
        assert_eq!(stats.format_hash_rate(), "12.00 H/s");
        assert_eq!(format_hash_rate(2_500_000_000.0), "2.50 GH/s");
    }
}
