//! Retry policy for port calls.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use mdsync_storage::PortResult;
use std::future::Future;
use tracing::{debug, warn};

/// Re-invokes port calls that answer with `retry = true`.
///
/// A success returns at once. A retryable rejection waits
/// [`RetryConfig::delay`] and calls again, up to
/// [`RetryConfig::max_attempts`] calls in total, then fails with
/// [`SyncError::Exhausted`]. Any other failure is returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `call` under the policy. `label` names the call in logs.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PortResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_message = String::new();

        for attempt in 1..=max_attempts {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(call = label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    warn!(call = label, attempt, max_attempts, error = %e, "backend asked for retry");
                    last_message = e.message().to_string();
                    if attempt < max_attempts && !self.config.delay.is_zero() {
                        tokio::time::sleep(self.config.delay).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SyncError::Exhausted {
            attempts: max_attempts,
            last_message,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
