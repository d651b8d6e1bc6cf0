//! Request dispatcher enforcing rate limit gates.
//!
//! A [`RequestDispatcher`] describes one HTTP call and the gates guarding it.
//! Sending checks every gate first and refuses the call without touching the
//! network if any of them is blocked. Otherwise the call is made and every
//! gate is updated from the response headers.
//!
//! The check and the later update are not atomic. Two dispatchers sharing a
//! cache can both see an endpoint as clear and both send before either
//! records the block.

use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::GateCache;
use crate::error::{Result, WithLimitsError};
use crate::ratelimit::RateLimit;
use crate::transport::{OutboundRequest, Response, Transport};

/// What to do when a response lacks usable rate limit headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedHeaderPolicy {
    /// Update every gate, then fail the send with the first malformed header.
    #[default]
    Fail,
    /// Log a warning and return the response.
    Ignore,
}

/// The gate that refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub system: String,
    pub endpoint: String,
}

impl From<&RateLimit> for RateLimitExceeded {
    fn from(gate: &RateLimit) -> Self {
        Self {
            system: gate.system_name().to_string(),
            endpoint: gate.endpoint_name().to_string(),
        }
    }
}

impl From<RateLimitExceeded> for WithLimitsError {
    fn from(blocked: RateLimitExceeded) -> Self {
        WithLimitsError::RateLimitExceeded {
            system: blocked.system,
            endpoint: blocked.endpoint,
        }
    }
}

impl std::fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.system, self.endpoint)
    }
}

/// Outcome of [`RequestDispatcher::send`].
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// The call was made; the response may have any status.
    Completed(Response),
    /// A gate was blocked and no call was made.
    Blocked(RateLimitExceeded),
}

impl Dispatch {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Dispatch::Blocked(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Dispatch::Completed(response) => Some(response),
            Dispatch::Blocked(_) => None,
        }
    }

    pub fn blocked_by(&self) -> Option<&RateLimitExceeded> {
        match self {
            Dispatch::Completed(_) => None,
            Dispatch::Blocked(blocked) => Some(blocked),
        }
    }

    /// The response, or [`WithLimitsError::RateLimitExceeded`] if blocked.
    pub fn into_response(self) -> Result<Response> {
        match self {
            Dispatch::Completed(response) => Ok(response),
            Dispatch::Blocked(blocked) => Err(blocked.into()),
        }
    }
}

/// Builder and executor for one rate-limited HTTP call.
pub struct RequestDispatcher {
    base_uri: String,
    method: Method,
    path: String,
    headers: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    rate_limits: Vec<RateLimit>,
    on_malformed: MalformedHeaderPolicy,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn GateCache>,
}

impl RequestDispatcher {
    /// Create a `GET` dispatcher with no gates.
    ///
    /// Gates attached with [`RequestDispatcher::with_limit`] keep their state
    /// in `cache`.
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn GateCache>) -> Self {
        Self {
            base_uri: String::new(),
            method: Method::GET,
            path: String::new(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            rate_limits: Vec::new(),
            on_malformed: MalformedHeaderPolicy::default(),
            transport,
            cache,
        }
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Merge request headers; later values win.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Merge query parameters; later values win.
    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a new gate, configured by `configure`.
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use withlimits::{MemoryCache, ReqwestTransport, RequestDispatcher};
    /// # fn build(transport: Arc<ReqwestTransport>) -> RequestDispatcher {
    /// RequestDispatcher::new(transport, Arc::new(MemoryCache::new()))
    ///     .with_base_uri("https://api.github.com")
    ///     .path("/users")
    ///     .with_limit(|limit| {
    ///         limit.system("github").endpoint("/users").header("X-RateLimit");
    ///     })
    /// # }
    /// ```
    pub fn with_limit<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut RateLimit),
    {
        let mut rate_limit = RateLimit::new(self.cache.clone());
        configure(&mut rate_limit);
        self.rate_limits.push(rate_limit);
        self
    }

    pub fn on_malformed_headers(mut self, policy: MalformedHeaderPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// The target URL, `base_uri` followed by `path`.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_uri, self.path)
    }

    pub fn rate_limits(&self) -> &[RateLimit] {
        &self.rate_limits
    }

    /// The call the transport will be asked to perform.
    pub fn request(&self) -> OutboundRequest {
        OutboundRequest {
            method: self.method.clone(),
            url: self.url(),
            headers: self.headers.clone(),
            query: self.query.clone(),
        }
    }

    /// Send the request unless a gate is blocked.
    ///
    /// Transport failures are returned unchanged and leave the gates alone.
    /// A response with any status updates every gate in attachment order.
    #[instrument(skip(self), fields(method = %self.method, url = %self.url()))]
    pub async fn send(&self) -> Result<Dispatch> {
        if let Some(blocked) = self.check_gates().await? {
            return Ok(Dispatch::Blocked(blocked));
        }

        let response = self.transport.send(self.request()).await?;
        debug!(status = %response.status, "Response received");

        self.record(&response).await?;

        Ok(Dispatch::Completed(response))
    }

    async fn check_gates(&self) -> Result<Option<RateLimitExceeded>> {
        for gate in &self.rate_limits {
            if gate.is_exceeded().await? {
                info!(
                    system = gate.system_name(),
                    endpoint = gate.endpoint_name(),
                    "Request refused by rate limit gate"
                );
                return Ok(Some(RateLimitExceeded::from(gate)));
            }
        }
        Ok(None)
    }

    async fn record(&self, response: &Response) -> Result<()> {
        let mut first_error = None;

        for gate in &self.rate_limits {
            let err = match gate.record_response(response).await {
                Ok(_) => continue,
                Err(err) => err,
            };

            let ignored = matches!(err, WithLimitsError::MalformedRateLimitHeader { .. })
                && self.on_malformed == MalformedHeaderPolicy::Ignore;

            warn!(
                system = gate.system_name(),
                endpoint = gate.endpoint_name(),
                error = %err,
                ignored,
                "Failed to update rate limit gate"
            );

            if !ignored && first_error.is_none() {
                first_error = Some(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("method", &self.method)
            .field("url", &self.url())
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("rate_limits", &self.rate_limits)
            .field("on_malformed", &self.on_malformed)
            .finish()
    }
}
