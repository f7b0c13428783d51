//! Shared retry policy for chain submissions
//!
//! Every executor that submits transactions goes through the same policy:
//! 3 attempts with a doubling delay (2s, 4s, 8s), retrying only errors the
//! classifier considers transient. Validation and revert-style failures are
//! returned to the caller on the first attempt.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Retry schedule for fallible chain operations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each retry after that
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// The policy used for transaction submission everywhere in the kit.
    pub fn transaction_submission() -> Self {
        Self::default()
    }

    /// Delay before the retry following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Drive `op` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(op = op_name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether an error is worth retrying.
///
/// Typed network errors are checked directly; everything else goes through
/// the substring classifier on the rendered message.
fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        Error::Config(_) | Error::InvalidArgument(_) | Error::Blocked(_) => false,
        other => crate::chain::is_transient(&other.to_string()),
    }
}
