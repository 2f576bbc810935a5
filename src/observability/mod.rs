//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout via tracing-subscriber)
//!     → Metrics recorder installed by the embedder
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (network, url, attempt, task)
//! - Metric updates are cheap atomic increments; no recorder installed
//!   means they are no-ops
//! - The embedder owns exporter wiring; this crate only records

pub mod logging;
pub mod metrics;
