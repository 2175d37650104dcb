//! Tracing bootstrap
//!
//! Test binaries call [`init_tracing`] from every test; only the first call
//! installs a subscriber.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with the given verbosity
///
/// `RUST_LOG` wins when set. Otherwise `quiet` selects `error`, and
/// `verbose` selects `info` (0), `debug` (1) or `trace` (2+).
pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose, quiet));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_test_writer())
        .with(filter)
        .try_init();
}

fn default_filter(verbose: u8, quiet: bool) -> EnvFilter {
    EnvFilter::new(filter_directive(verbose, quiet))
}

fn filter_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
