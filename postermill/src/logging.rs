//! Logging initialization.
//!
//! Structured logging via `tracing`; the filter comes from `RUST_LOG` with a
//! sensible default. Embedding applications that install their own
//! subscriber simply skip this.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber with an `info` default.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_default("info");
}

/// Initializes the global subscriber, defaulting to `default_filter` when
/// `RUST_LOG` is unset.
pub fn init_with_default(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
