//! Logging bootstrap
//!
//! The worker logs through `tracing`; this module wires the global
//! subscriber exactly once, in the binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogLevel;

/// Initialize the global tracing subscriber.
///
/// The configured level seeds the filter; a `RUST_LOG` environment variable
/// takes precedence when present.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
