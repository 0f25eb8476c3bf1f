//! Error types for the mining node.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the mining backend.
///
/// Both kinds are recoverable: the scheduler logs them and keeps the session
/// running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport or communication failure
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Response could not be interpreted
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Whether this is a transport failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

/// No receiving address could be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The wallet backend could not be reached or answered badly
    #[error("Address lookup failed: {0}")]
    Backend(#[from] BackendError),

    /// The wallet refused to hand out an address
    #[error("Wallet returned no usable address")]
    NoAddress,
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
