//! Configuration management for withlimits.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::GateCache;
use crate::dispatcher::{MalformedHeaderPolicy, RequestDispatcher};
use crate::error::{Result, WithLimitsError};
use crate::ratelimit::{LimitHeaders, RateLimit};
use crate::transport::{ReqwestTransport, Transport};

/// Prefix of environment variables overriding file settings, e.g.
/// `WITHLIMITS__CLIENT__BASE_URI`.
pub const ENV_PREFIX: &str = "WITHLIMITS";

/// Main configuration for withlimits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithLimitsConfig {
    /// HTTP client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Gates attached to every request
    #[serde(default)]
    pub gates: Vec<GateConfig>,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URI prepended to every request path
    #[serde(default)]
    pub base_uri: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Handling of responses without usable rate limit headers
    #[serde(default)]
    pub on_malformed_headers: MalformedHeaderPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: String::new(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            headers: BTreeMap::new(),
            on_malformed_headers: MalformedHeaderPolicy::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("withlimits/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Name of the remote system
    pub system: String,
    /// Name or path of the governed endpoint
    pub endpoint: String,
    /// Header convention; a string for the combined form, a
    /// `{limit, window, count}` map for separate headers
    pub header: LimitHeaders,
}

impl GateConfig {
    /// Configure a gate from this entry.
    pub fn apply(&self, gate: &mut RateLimit) {
        gate.system(self.system.clone())
            .endpoint(self.endpoint.clone())
            .headers(self.header.clone());
    }
}

impl ClientConfig {
    /// Build a reqwest transport with this configuration's timeout and agent.
    pub fn build_transport(&self) -> Result<ReqwestTransport> {
        Ok(ReqwestTransport::new(
            Duration::from_secs(self.timeout_secs),
            &self.user_agent,
        )?)
    }
}

impl WithLimitsConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| WithLimitsError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a YAML file, then apply `WITHLIMITS__*` environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| {
                WithLimitsError::Config(format!(
                    "Failed to read configuration from {}: {}",
                    path.display(),
                    e
                ))
            })?
            .try_deserialize()
            .map_err(|e| WithLimitsError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Create a dispatcher for `path` with the configured base URI, headers
    /// and gates.
    pub fn dispatcher(
        &self,
        path: &str,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn GateCache>,
    ) -> RequestDispatcher {
        let dispatcher = RequestDispatcher::new(transport, cache)
            .with_base_uri(self.client.base_uri.clone())
            .path(path)
            .with_headers(self.client.headers.clone())
            .on_malformed_headers(self.client.on_malformed_headers);

        self.gates
            .iter()
            .fold(dispatcher, |dispatcher, gate| {
                dispatcher.with_limit(|limit| gate.apply(limit))
            })
    }
}
