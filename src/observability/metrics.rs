//! Metrics collection.
//!
//! # Metrics
//! - `ledger_cache_lookups_total` (counter): cache lookups by result
//! - `ledger_rpc_attempts_total` (counter): RPC attempts by operation, outcome
//! - `ledger_batch_excluded_total` (counter): batch sub-tasks dropped
//! - `ledger_connections_open` (gauge): live connection handles
//! - `ledger_tx_submitted_total` (counter): transaction outcomes

use metrics::{counter, gauge};

/// Record a query-cache lookup outcome.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("ledger_cache_lookups_total", "result" => result).increment(1);
}

/// Record one attempt of a retried operation.
pub fn record_attempt(op: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("ledger_rpc_attempts_total", "op" => op, "outcome" => outcome).increment(1);
}

/// Record batch sub-tasks excluded from an aggregate (failure or deadline).
pub fn record_batch_excluded(reason: &'static str, count: u64) {
    if count > 0 {
        counter!("ledger_batch_excluded_total", "reason" => reason).increment(count);
    }
}

/// Record the number of open connection handles.
pub fn record_connections_open(count: usize) {
    gauge!("ledger_connections_open").set(count as f64);
}

/// Record a completed transaction submission.
pub fn record_tx_submitted(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("ledger_tx_submitted_total", "outcome" => outcome).increment(1);
}
