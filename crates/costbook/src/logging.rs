//! Tracing setup for embedders and examples.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber honoring `RUST_LOG`, defaulting to INFO
/// (DEBUG when `verbose`). Safe to call more than once; later calls are
/// no-ops.
pub fn init(verbose: bool) {
    let default = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default.into()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
