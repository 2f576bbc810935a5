//! Transaction composition and submission.
//!
//! # Responsibilities
//! - Compose, sign, and submit chain calls with a bounded retry budget
//! - Record every submission durably, pending before the wire and
//!   complete after the chain answers
//!
//! # Data Flow
//! ```text
//! ComposeArgs
//!     → signer resolution (keyring alias)
//!     → pending record written to disk
//!     → retry loop: compose → [sudo wrap] → sign → submit
//!     → pending removed, complete record written
//! ```
//!
//! # Design Decisions
//! - The pending record is written before any network traffic; a crash
//!   mid-submission leaves evidence of the in-flight call
//! - A chain-reported failure is a completed submission, not an error;
//!   only transport-level trouble consumes retry budget

pub mod record;
pub mod submitter;

pub use record::{complete_path, pending_path, SubmitOutcome, TxRecord, TxStatus};
pub use submitter::{ComposeArgs, TxSubmitter};
