//! Miner configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) is a valid configuration. CLI flags override afterwards.

use std::fs;
use std::path::Path;
use std::time::Duration;

use miner_core::Network;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Network name ("mainnet", "testnet", "regtest").
    pub network: Option<String>,

    /// Mine to this address instead of asking the wallet.
    pub address: Option<String>,

    /// Node RPC connection.
    pub rpc: RpcConfig,

    /// Cycle timing and randomization.
    pub scheduler: SchedulerConfig,
}

/// JSON-RPC connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Full URL; defaults to localhost on the network's RPC port.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout. Must cover a full `generatetoaddress` call.
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_timeout_secs() -> u64 {
    600
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            password: None,
            timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Lower bound of the pre-attempt delay.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the pre-attempt delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Try-budget jitter as a fraction of the base budget.
    #[serde(default = "default_tries_jitter")]
    pub tries_jitter: f64,

    /// How long a chain-state snapshot may be reused for difficulty.
    #[serde(default = "default_difficulty_refresh_secs")]
    pub difficulty_refresh_secs: u64,

    /// Pause after a failed backend call.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Ask the wallet for a new address before every attempt.
    #[serde(default)]
    pub fresh_address_per_cycle: bool,

    /// Seed for the session's random source; entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_min_delay_ms() -> u64 {
    10
}
fn default_max_delay_ms() -> u64 {
    50
}
fn default_tries_jitter() -> f64 {
    0.20
}
fn default_difficulty_refresh_secs() -> u64 {
    10
}
fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            tries_jitter: default_tries_jitter(),
            difficulty_refresh_secs: default_difficulty_refresh_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            fresh_address_per_cycle: false,
            seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Delay bounds, ordered.
    pub fn delay_range(&self) -> (Duration, Duration) {
        let lo = self.min_delay_ms.min(self.max_delay_ms);
        let hi = self.min_delay_ms.max(self.max_delay_ms);
        (Duration::from_millis(lo), Duration::from_millis(hi))
    }

    /// Jitter fraction limited to [0, 1).
    pub fn jitter(&self) -> f64 {
        if self.tries_jitter.is_finite() {
            self.tries_jitter.clamp(0.0, 0.99)
        } else {
            0.0
        }
    }

    pub fn difficulty_refresh(&self) -> Duration {
        Duration::from_secs(self.difficulty_refresh_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.tries_jitter) {
            return Err(ConfigError::Invalid {
                field: "scheduler.tries_jitter",
                reason: format!("{} is outside [0, 1)", self.tries_jitter),
            });
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "scheduler.min_delay_ms",
                reason: format!(
                    "{} exceeds max_delay_ms {}",
                    self.min_delay_ms, self.max_delay_ms
                ),
            });
        }
        Ok(())
    }
}

impl MinerConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: MinerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.network {
            if Network::from_str(name).is_none() {
                return Err(ConfigError::Invalid {
                    field: "network",
                    reason: format!("unknown network {:?}", name),
                });
            }
        }
        self.scheduler.validate()
    }

    /// Selected network (mainnet when unset).
    pub fn network(&self) -> Network {
        self.network
            .as_deref()
            .and_then(Network::from_str)
            .unwrap_or_default()
    }

    /// RPC endpoint, defaulting to the network's local port.
    pub fn rpc_url(&self) -> String {
        match &self.rpc.url {
            Some(url) => url.clone(),
            None => format!("http://127.0.0.1:{}", self.network().default_rpc_port()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MinerConfig::from_toml_str("").unwrap();
        assert_eq!(config.network(), Network::Mainnet);
        assert_eq!(config.rpc_url(), "http://127.0.0.1:12347");
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(
            config.scheduler.delay_range(),
            (Duration::from_millis(10), Duration::from_millis(50))
        );
        assert_eq!(config.rpc.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_sections() {
        let config = MinerConfig::from_toml_str(
            r#"
            network = "regtest"

            [rpc]
            user = "miner"
            password = "hunter2"

            [scheduler]
            max_delay_ms = 200
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.network(), Network::Regtest);
        assert_eq!(config.rpc_url(), "http://127.0.0.1:18443");
        assert_eq!(config.rpc.user.as_deref(), Some("miner"));
        assert_eq!(config.scheduler.max_delay_ms, 200);
        assert_eq!(config.scheduler.min_delay_ms, 10);
        assert_eq!(config.scheduler.seed, Some(7));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            MinerConfig::from_toml_str("network = \"moonnet\""),
            Err(ConfigError::Invalid { field: "network", .. })
        ));
        assert!(matches!(
            MinerConfig::from_toml_str("[scheduler]\ntries_jitter = 1.5"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            MinerConfig::from_toml_str("[scheduler]\nmin_delay_ms = 90\nmax_delay_ms = 20"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            MinerConfig::from_toml_str("[scheduler]\nmin_delay_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"mining-addr\"").unwrap();

        let config = MinerConfig::load(file.path()).unwrap();
        assert_eq!(config.address.as_deref(), Some("mining-addr"));

        let missing = MinerConfig::load(Path::new("/nonexistent/miner.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
