//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the ledger:
//!     → retry.rs (typed attempt budget around a single-attempt operation)
//!     → backoff.rs (jittered exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - A single `RetryPolicy` wraps connection opening, storage queries,
//!   and transaction submission; attempts within one policy run are
//!   strictly sequential
//! - Transient vs terminal failures are distinguished by error type;
//!   terminal errors short-circuit the budget
//! - The batch orchestrator does not retry; partial failure there is
//!   data, not an error

pub mod backoff;
pub mod retry;

pub use retry::RetryPolicy;
