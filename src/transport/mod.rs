//! HTTP transport abstraction.
//!
//! The dispatcher never talks to the network directly. It hands an
//! [`OutboundRequest`] to a [`Transport`] and reads rate limit headers off
//! the [`Response`] it gets back.

mod fake;
mod http_client;

pub use fake::StaticTransport;
pub use http_client::ReqwestTransport;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Errors raised when no response could be obtained.
///
/// A response with a non-success status is not an error at this level.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid request header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Everything a transport needs to perform one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    /// Fully-qualified URL, without the query string
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

/// A response obtained from the remote server, whatever its status.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header line. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "Skipping invalid response header"),
        }
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// All values of a header, in order.
    ///
    /// Repeated field lines are read in order and each line is split on
    /// commas. Empty items are kept so every value stays at its position.
    /// Bytes that are not UTF-8 are replaced, not dropped. Returns an empty
    /// list when the header is absent.
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .flat_map(|value| {
                String::from_utf8_lossy(value.as_bytes())
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Trait for transports able to perform an HTTP call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call.
    ///
    /// Non-success statuses must still yield `Ok(Response)`; errors are
    /// reserved for failures where no response exists.
    async fn send(&self, request: OutboundRequest) -> Result<Response, TransportError>;
}
