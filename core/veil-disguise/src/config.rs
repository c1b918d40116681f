//! Disguise check configuration.

use crate::error::{DisguiseError, DisguiseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for [`DisguiseEngine`](crate::DisguiseEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisguiseConfig {
    /// Dedicated check endpoint. Not part of the API endpoint rotation.
    pub endpoint: String,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
    /// Lifetime of a server verdict that carries no `expiration_time`.
    pub default_ttl_secs: u64,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for DisguiseConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://uni.cloudmantoub.online/disguise_check.php".to_string(),
            timeout_secs: 10,
            default_ttl_secs: 300,
            user_agent: format!("Veil/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DisguiseConfig {
    /// Creates a configuration pointing at `endpoint`, other fields default.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> DisguiseResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DisguiseError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| DisguiseError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DisguiseResult<()> {
        let lower = self.endpoint.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(DisguiseError::Config(format!(
                "disguise endpoint must be an http(s) URL: {:?}",
                self.endpoint
            )));
        }
        if self.timeout_secs == 0 {
            return Err(DisguiseError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}
