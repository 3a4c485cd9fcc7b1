//! Error types for the dnsward engine.

use std::io;

use thiserror::Error;

/// Main error type for dnsward operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("lookup service not initialized; call initialize() first")]
    NotInitialized,

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("version conflict on domain {domain:?}")]
    ConcurrencyConflict { domain: String },

    #[error("update for domain {domain:?} exhausted {attempts} attempts")]
    ConcurrencyExhausted { domain: String, attempts: u32 },

    #[error("batch write rejected: {0}")]
    TransactionRejected(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("store.max_retries must be greater than 0")]
    ZeroMaxRetries,

    #[error("store.initial_backoff_ms must be greater than 0")]
    ZeroInitialBackoff,

    #[error("store.record_ttl_days must be greater than 0")]
    ZeroRecordTtl,

    #[error("entropy_cache_capacity must be greater than 0")]
    ZeroEntropyCacheCapacity,

    #[error("classifier.{name} must be greater than 0")]
    NonPositiveThreshold { name: &'static str },

    #[error("classifier.nx_domain_ratio_hard must be at most 1.0, got {value}")]
    RatioOutOfRange { value: f64 },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error is transient and the operation may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Storage(_) | Self::Io(_)
        )
    }
}
