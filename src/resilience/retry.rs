//! Typed retry policy.
//!
//! # Responsibilities
//! - Bound attempts for a single-attempt async operation
//! - Sleep with jittered backoff between attempts
//! - Propagate the final attempt's error once the budget is exhausted
//! - Short-circuit on errors marked non-retryable

use std::future::Future;

use crate::error::Result;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Attempt budget plus backoff shape for one operation class.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first. Clamped to at least 1.
    pub max_attempts: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// A policy with the given budget and the default backoff shape.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// The same backoff shape with a different attempt budget.
    pub fn with_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..*self
        }
    }

    /// Run `op` until it succeeds, the budget is spent, or it fails with
    /// a non-retryable error. Attempts are strictly sequential.
    pub async fn run<T, F, Fut>(&self, op_name: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    metrics::record_attempt(op_name, true);
                    return Ok(value);
                }
                Err(e) => {
                    metrics::record_attempt(op_name, false);
                    attempt += 1;
                    if !e.is_retryable() || attempt >= budget {
                        return Err(e);
                    }
                    let delay = calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        budget,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
