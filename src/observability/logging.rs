//! Structured logging initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with an env-filter.
///
/// Honors `RUST_LOG`; falls back to `ledger_client=info`. Safe to call
/// more than once (subsequent calls are no-ops), which keeps tests that
/// share a process from panicking.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
