//! Diagnostic logging on stderr.
//!
//! stdout carries exactly one JSON line, so every log event goes to stderr.

use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "jvbridge=debug" } else { "warn" }
}

/// Install the global subscriber. `RUST_LOG` wins over `debug`.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init();
}
