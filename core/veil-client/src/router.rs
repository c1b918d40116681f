//! Failure-driven endpoint rotation.
//!
//! The router holds the ordered endpoint list `[primary, fallback…]`, the
//! index of the endpoint in use, and a count of consecutive failures seen on
//! it. Reaching the threshold rotates to the next endpoint (wrapping to the
//! primary) and resets the count.
//!
//! Every [`Selection`] records the rotation epoch it was taken in. A failure
//! reported against an older epoch refers to an endpoint that has already
//! been rotated away from and is ignored, so slow requests completing late
//! cannot push the router past a healthy endpoint.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// The endpoint a request was issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    index: usize,
    epoch: u64,
    base_url: String,
}

impl Selection {
    /// Position in the endpoint list (0 = primary).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Default)]
struct RouterState {
    index: usize,
    failures: u32,
    epoch: u64,
}

/// Thread-safe endpoint selector.
#[derive(Debug)]
pub struct EndpointRouter {
    endpoints: Vec<String>,
    threshold: u32,
    state: Mutex<RouterState>,
}

impl EndpointRouter {
    /// Creates a router over `primary` followed by `fallbacks`.
    pub fn new(
        primary: impl Into<String>,
        fallbacks: impl IntoIterator<Item = String>,
        threshold: u32,
    ) -> ClientResult<Self> {
        let primary = primary.into();
        if primary.trim().is_empty() {
            return Err(ClientError::Config("primary endpoint is empty".into()));
        }
        if threshold == 0 {
            return Err(ClientError::Config("failure threshold must be at least 1".into()));
        }
        let endpoints = std::iter::once(primary)
            .chain(fallbacks)
            .map(|url| url.trim_end_matches('/').to_string())
            .collect();
        Ok(Self {
            endpoints,
            threshold,
            state: Mutex::new(RouterState::default()),
        })
    }

    /// Creates a router from client configuration.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(
            config.primary_url.clone(),
            config.fallback_urls.iter().cloned(),
            config.failure_threshold,
        )
    }

    // Counters stay consistent even if a holder panicked.
    fn lock(&self) -> std::sync::MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn selection(&self, state: &RouterState) -> Selection {
        Selection {
            index: state.index,
            epoch: state.epoch,
            base_url: self.endpoints[state.index].clone(),
        }
    }

    /// Returns the endpoint to use for the next request.
    pub fn current(&self) -> Selection {
        let state = self.lock();
        self.selection(&state)
    }

    /// Records a failed request against `selection`. Returns true if this
    /// failure caused a rotation.
    pub fn record_failure(&self, selection: &Selection) -> bool {
        let mut state = self.lock();
        if selection.epoch != state.epoch {
            debug!(
                endpoint = %selection.base_url,
                "ignoring failure reported against a superseded endpoint"
            );
            return false;
        }
        state.failures += 1;
        debug!(
            endpoint = %selection.base_url,
            failures = state.failures,
            threshold = self.threshold,
            "endpoint failure recorded"
        );
        if state.failures >= self.threshold {
            self.advance(&mut state);
            return true;
        }
        false
    }

    /// Records a successful request, clearing the consecutive-failure count.
    pub fn record_success(&self, selection: &Selection) {
        let mut state = self.lock();
        if selection.epoch == state.epoch {
            state.failures = 0;
        }
    }

    /// Moves to the next endpoint unconditionally.
    pub fn rotate(&self) -> Selection {
        let mut state = self.lock();
        self.advance(&mut state);
        self.selection(&state)
    }

    /// Moves past `selection`'s endpoint if it is still the one in use.
    /// Returns true if this call rotated.
    pub fn rotate_from(&self, selection: &Selection) -> bool {
        let mut state = self.lock();
        if selection.epoch != state.epoch {
            debug!(endpoint = %selection.base_url, "endpoint already rotated away from");
            return false;
        }
        self.advance(&mut state);
        true
    }

    fn advance(&self, state: &mut RouterState) {
        let from = state.index;
        state.index = (state.index + 1) % self.endpoints.len();
        state.failures = 0;
        state.epoch += 1;
        info!(
            from = %self.endpoints[from],
            to = %self.endpoints[state.index],
            "switched API endpoint"
        );
    }

    /// Index of the endpoint in use (0 = primary).
    pub fn index(&self) -> usize {
        self.lock().index
    }

    /// Consecutive failures on the endpoint in use.
    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Number of endpoints, primary included.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in rotation order.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}
