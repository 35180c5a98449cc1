//! Logging configuration for the `wmbs` binary.
//!
//! Library code only emits `tracing` events; the binary decides where they go.

use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the env filter, honouring `RUST_LOG` and falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initializes logging to stderr.
///
/// Stdout is reserved for command output (schema text, JSON results), so
/// diagnostics never interleave with it.
pub fn init_stderr_logging(default: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .init();
}
