//! Client configuration.

use crate::error::{ClientError, ClientResult};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-operation request timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Liveness ping.
    pub ping_secs: u64,
    /// Catalog, verification and refresh calls.
    pub api_secs: u64,
    /// Binding-status lookup.
    pub lookup_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ping_secs: 5,
            api_secs: 15,
            lookup_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn ping(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    pub fn api(&self) -> Duration {
        Duration::from_secs(self.api_secs)
    }

    pub fn lookup(&self) -> Duration {
        Duration::from_secs(self.lookup_secs)
    }
}

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary API base URL, including the `/api/client` prefix.
    pub primary_url: String,
    /// Fallback base URLs, tried in order after the primary.
    pub fallback_urls: Vec<String>,
    /// Consecutive failures on one endpoint before rotating.
    pub failure_threshold: u32,
    /// Retry behaviour for a single request.
    pub retry: RetryPolicy,
    /// Request timeouts.
    pub timeouts: Timeouts,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            primary_url: "https://renmai.cloudmantoub.online/api/client".to_string(),
            fallback_urls: vec!["https://renmai.cloudmantoub.online/api/client".to_string()],
            failure_threshold: 2,
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            user_agent: format!("Veil/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for a single endpoint with no fallbacks.
    #[must_use]
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            primary_url: url.into(),
            fallback_urls: Vec::new(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the client cannot work with.
    pub fn validate(&self) -> ClientResult<()> {
        for url in std::iter::once(&self.primary_url).chain(&self.fallback_urls) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ClientError::Config(format!(
                    "endpoint {url:?} is not an http(s) URL"
                )));
            }
        }
        if self.failure_threshold == 0 {
            return Err(ClientError::Config(
                "failure_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
