//! Logging setup helpers
//!
//! The crate emits events through `tracing`; binaries and tests call
//! one of these helpers once to get formatted output. Filtering follows
//! the usual `RUST_LOG` conventions.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted subscriber filtered by `RUST_LOG`, defaulting
/// to `info`. Safe to call once per process; later calls are ignored.
pub fn init_logging() {
    init_logging_with_filter("info");
}

/// Install a formatted subscriber with an explicit default filter
/// directive, still overridable by `RUST_LOG`.
pub fn init_logging_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
