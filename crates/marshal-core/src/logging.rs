//! Tracing bootstrap for binaries and integration tests.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `level` is a default directive ("info", "debug", ...) that the
/// `RUST_LOG` environment variable overrides. Safe to call more than once;
/// later calls are no-ops.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
