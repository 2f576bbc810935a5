//! Concurrent batch orchestration.
//!
//! # Responsibilities
//! - Fan out named, independent sub-queries as concurrent tasks
//! - Collect results by task name as each completes
//! - Enforce one global deadline; over-budget tasks are abandoned, not
//!   forcibly cancelled, and simply absent from the result
//!
//! # Design Decisions
//! - A failing sub-task is partial data, not an error: it is excluded
//!   and logged, never raised to the caller
//! - No cross-task ordering guarantee; the result mapping is
//!   order-independent by construction

use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::Result;
use crate::observability::metrics;

/// Runs named sub-queries concurrently under one global deadline.
#[derive(Debug, Clone, Copy)]
pub struct BatchOrchestrator {
    timeout: Duration,
}

impl BatchOrchestrator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured global deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every task and collect the successes by name.
    ///
    /// Failed tasks are excluded (logged at warn); tasks still running
    /// at the deadline keep running detached but their results are
    /// dropped.
    pub async fn run<T: Send + 'static>(
        &self,
        tasks: Vec<(String, BoxFuture<'static, Result<T>>)>,
    ) -> HashMap<String, T> {
        let total = tasks.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));

        for (name, fut) in tasks {
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = fut.await;
                // Send fails only after abandonment; nothing to do then
                let _ = tx.send((name, result)).await;
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        let mut collected = HashMap::new();
        let mut received = 0usize;
        let mut failed = 0u64;

        while received < total {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((name, Ok(value)))) => {
                    received += 1;
                    collected.insert(name, value);
                }
                Ok(Some((name, Err(e)))) => {
                    received += 1;
                    failed += 1;
                    tracing::warn!(task = %name, error = %e, "batch sub-query failed, excluding");
                }
                Ok(None) => break,
                Err(_) => {
                    let abandoned = (total - received) as u64;
                    tracing::warn!(
                        collected = collected.len(),
                        abandoned,
                        total,
                        "batch deadline reached, abandoning stragglers"
                    );
                    metrics::record_batch_excluded("deadline", abandoned);
                    break;
                }
            }
        }
        metrics::record_batch_excluded("failure", failed);

        collected
    }
}
