//! Error types shared across the resolution pipeline.
//!
//! None of these escape a resolution: provider errors are folded into the
//! cascade, cache errors degrade to reduced caching, and audit errors are
//! only logged.

use std::time::Duration;
use thiserror::Error;

/// Outcome of a single provider attempt that did not yield a translation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider cannot handle this language pair. The chain skips it.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status from the provider endpoint
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty result")]
    EmptyResult,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ProviderError {
    /// Whether the chain should treat this as a skip rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, ProviderError::UnsupportedLanguage(_))
    }

    /// Whether a transport-level retry inside the provider makes sense.
    ///
    /// Network errors, 429 and 5xx are transient. Other 4xx statuses and
    /// payload problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Unreachable(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidPayload(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

/// Failure of the distributed cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Failure loading a read-only data asset (phrase table, script table).
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse data file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit database error: {0}")]
    Database(#[from] sqlx::Error),
}
