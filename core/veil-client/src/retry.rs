//! Bounded retry with a scheduled delay.

use crate::error::ClientResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often, and how patiently, a failed request is repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay_ms: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. `attempt` receives the zero-based attempt
    /// number.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> ClientResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut n = 0;
        loop {
            match attempt(n).await {
                Ok(value) => {
                    if n > 0 {
                        debug!(attempt = n + 1, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && n < self.max_retries => {
                    n += 1;
                    warn!(
                        attempt = n,
                        max_attempts = self.max_attempts(),
                        error = %e,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(self.delay()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
