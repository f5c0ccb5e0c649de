//! Logging setup for relay binaries.
//!
//! Libraries only emit `tracing` events; the binary decides where they go by
//! calling [`init`] once at startup.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive for a `-v` count.
pub fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs a stderr subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Calling it again is harmless; only the first call installs anything.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
