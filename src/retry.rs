//! Fixed-delay retry for connection failures.
//!
//! Only [`ConduitError::TransientNetwork`] is retried. A request that reached
//! the server and came back with an error status is never replayed here,
//! since creation endpoints are not idempotent.

use std::future::Future;
use std::time::Duration;

use crate::constants::{MAX_REQUEST_ATTEMPTS, RETRY_DELAY};
use crate::error::{ConduitError, Result};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, or `None` to retry until success.
    pub max_attempts: Option<u32>,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(MAX_REQUEST_ATTEMPTS, RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Policy giving up after `max_attempts` attempts.
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    /// Policy retrying transient failures forever.
    ///
    /// Only suitable for idempotent state-set calls.
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }

    /// Execute an async operation, retrying transient failures.
    ///
    /// The closure is called until it succeeds, returns a non-transient
    /// error, or the attempt bound is reached. Exhaustion yields
    /// [`ConduitError::TransientNetwork`] with the total attempt count.
    /// The delay is a `tokio` sleep, so other tasks keep running while
    /// this one waits.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::debug!("{operation} succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(ConduitError::TransientNetwork { message, .. }) => {
                    if self.exhausted(attempt) {
                        log::warn!("{operation} gave up after {attempt} attempt(s): {message}");
                        return Err(ConduitError::TransientNetwork {
                            attempts: attempt,
                            message,
                        });
                    }
                    log::warn!(
                        "{operation} attempt {attempt} failed ({message}), retrying in {}s",
                        self.delay.as_secs()
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
