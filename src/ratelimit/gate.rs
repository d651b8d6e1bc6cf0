//! Per-endpoint rate limit gate.

use std::sync::Arc;
use tracing::{debug, info, trace};

use super::headers::LimitHeaders;
use super::key::GateKey;
use crate::cache::GateCache;
use crate::error::{Result, WithLimitsError};
use crate::transport::Response;

/// A gate guarding one endpoint of a remote system.
///
/// The gate reads the limit advertised in each response. Once usage reaches
/// the limit it stores a "blocked" flag that expires with the advertised
/// window. Only expiry clears a block; a later response under the limit does
/// not.
pub struct RateLimit {
    system: String,
    endpoint: String,
    headers: Option<LimitHeaders>,
    cache: Arc<dyn GateCache>,
}

impl RateLimit {
    pub(crate) fn new(cache: Arc<dyn GateCache>) -> Self {
        Self {
            system: String::new(),
            endpoint: String::new(),
            headers: None,
            cache,
        }
    }

    /// Set the name of the remote system.
    pub fn system(&mut self, system: impl Into<String>) -> &mut Self {
        self.system = system.into();
        self
    }

    /// Set the name of the governed endpoint.
    pub fn endpoint(&mut self, endpoint: impl Into<String>) -> &mut Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use the combined header convention rooted at `name`.
    ///
    /// `name` carries `[limit, window_seconds]` and `<name>-Count` carries the
    /// current usage.
    pub fn header(&mut self, name: impl Into<String>) -> &mut Self {
        self.headers = Some(LimitHeaders::combined(name));
        self
    }

    /// Use an explicit header convention.
    pub fn headers(&mut self, headers: LimitHeaders) -> &mut Self {
        self.headers = Some(headers);
        self
    }

    /// Name of the remote system.
    pub fn system_name(&self) -> &str {
        &self.system
    }

    /// Name of the governed endpoint.
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint
    }

    /// Header convention, if one has been configured.
    pub fn limit_headers(&self) -> Option<&LimitHeaders> {
        self.headers.as_ref()
    }

    /// The cache key for this gate's state.
    pub fn key(&self) -> GateKey {
        GateKey::new(&self.system, &self.endpoint)
    }

    /// Update the gate from a response.
    ///
    /// Returns `true` if the response shows the limit has been reached, in
    /// which case the endpoint is blocked for the advertised window.
    pub async fn record_response(&self, response: &Response) -> Result<bool> {
        let key = self.key();
        let headers = self.headers.as_ref().ok_or_else(|| {
            WithLimitsError::Config(format!("gate {} has no limit header configured", key))
        })?;

        let snapshot = headers.parse(response)?;

        trace!(
            key = %key,
            limit = snapshot.limit,
            count = snapshot.count,
            window_secs = snapshot.window.as_secs(),
            "Recording rate limit headers"
        );

        if !snapshot.is_exhausted() {
            return Ok(false);
        }

        self.cache.put(&key, true, snapshot.window).await?;

        info!(
            key = %key,
            limit = snapshot.limit,
            count = snapshot.count,
            window_secs = snapshot.window.as_secs(),
            "Rate limit reached, blocking endpoint"
        );

        Ok(true)
    }

    /// Whether calls to the endpoint are currently blocked.
    pub async fn is_exceeded(&self) -> Result<bool> {
        let key = self.key();
        let blocked = self.cache.get(&key, false).await?;

        debug!(key = %key, blocked, "Checked gate");

        Ok(blocked)
    }
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("system", &self.system)
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers)
            .finish()
    }
}
