//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVES: &str = "wastewise=info,tower_http=info";

/// Install the global fmt subscriber, filtered by `RUST_LOG`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
