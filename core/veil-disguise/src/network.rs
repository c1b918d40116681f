//! Reachability classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// The kind of network path the device currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPath {
    /// No usable path. Decisions come from the cache.
    Unavailable,
    Wifi,
    Cellular,
    /// Reachable over some other interface (wired, VPN, unknown).
    Other,
}

impl NetworkPath {
    /// Returns true if the path warrants the advanced check.
    #[must_use]
    pub fn is_mobile_or_wifi(self) -> bool {
        matches!(self, Self::Wifi | Self::Cellular)
    }
}

/// Reports the current network path.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn classify(&self) -> NetworkPath;
}

/// A probe that always reports the same path.
#[derive(Debug, Clone, Copy)]
pub struct StaticReachability(pub NetworkPath);

#[async_trait]
impl ReachabilityProbe for StaticReachability {
    async fn classify(&self) -> NetworkPath {
        self.0
    }
}

/// Classifies by opening a TCP connection to a known host.
///
/// A desktop host cannot tell which interface carries the connection, so a
/// successful connect reports `connected_as` (default [`NetworkPath::Other`]).
#[derive(Debug, Clone)]
pub struct TcpReachability {
    address: String,
    timeout: Duration,
    connected_as: NetworkPath,
}

impl TcpReachability {
    /// Creates a probe for `address` (`host:port`).
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            connected_as: NetworkPath::Other,
        }
    }

    /// Derives the probe address from an `http(s)` URL.
    ///
    /// Returns `None` if the URL has no host.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let (scheme, rest) = url.split_once("://")?;
        let authority = rest.split(['/', '?', '#']).next()?;
        let authority = authority.rsplit('@').next()?;
        if authority.is_empty() {
            return None;
        }
        let address = if authority.contains(':') {
            authority.to_string()
        } else if scheme.eq_ignore_ascii_case("http") {
            format!("{authority}:80")
        } else {
            format!("{authority}:443")
        };
        Some(Self::new(address, timeout))
    }

    /// Sets the path reported when the connection succeeds.
    #[must_use]
    pub fn reporting(mut self, path: NetworkPath) -> Self {
        self.connected_as = path;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ReachabilityProbe for TcpReachability {
    async fn classify(&self) -> NetworkPath {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => self.connected_as,
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "reachability probe failed");
                NetworkPath::Unavailable
            }
            Err(_) => {
                debug!(address = %self.address, "reachability probe timed out");
                NetworkPath::Unavailable
            }
        }
    }
}
