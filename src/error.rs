//! Error types for withlimits.

use thiserror::Error;

use crate::cache::CacheError;
use crate::transport::TransportError;

/// Main error type for withlimits operations.
#[derive(Error, Debug)]
pub enum WithLimitsError {
    /// The transport failed before a response was obtained
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A rate limit header was missing or could not be parsed
    #[error("Malformed rate limit header {header}: {reason}")]
    MalformedRateLimitHeader { header: String, reason: String },

    /// A gate refused the request before it was sent
    #[error("Rate limit exceeded for {system} {endpoint}")]
    RateLimitExceeded { system: String, endpoint: String },

    /// Gate cache backend errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WithLimitsError {
    pub(crate) fn malformed(header: &str, reason: impl Into<String>) -> Self {
        WithLimitsError::MalformedRateLimitHeader {
            header: header.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for withlimits operations.
pub type Result<T> = std::result::Result<T, WithLimitsError>;
