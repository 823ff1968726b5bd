//! Logging setup for the `rdvw` binary.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. `RUST_LOG` wins when set; otherwise
/// the verbosity count picks the filter.
pub fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "info,rdv=debug,rdv.watch=debug,rdv.playwright=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
