//! Log subscriber setup.
//!
//! The library crates log through the `log` facade; the subscriber's
//! `tracing-log` bridge forwards those records here. Everything goes to
//! stderr so stdout carries only the report.

use tracing_subscriber::{fmt, EnvFilter};

/// Default directive when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. `--debug` overrides `RUST_LOG`.
pub fn init_tracing(debug: bool) {
    let _ = fmt()
        .with_env_filter(filter(debug))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
