//! Provider error types

use std::time::Duration;
use thiserror::Error;

/// Errors from external collaborators
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing credential or identifier; fatal to the operation, not the process
    #[error("missing configuration: {0}")]
    Config(String),

    /// Recoverable by bounded retry before falling back
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("provider error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Unusable response body; treated as a provider failure
    #[error("invalid response: {0}")]
    Parse(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

impl ProviderError {
    /// Check if this is the rate-limit condition
    ///
    /// Rate limiting is the only condition that triggers bounded retry of
    /// the primary provider; everything else falls back immediately.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Get the retry duration if this is a rate-limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
