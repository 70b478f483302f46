//! Structured logging init. Native only; the library itself only emits
//! `tracing` events, it never installs a subscriber on its own.

use tracing_subscriber::EnvFilter;

/// Installs a subscriber writing to stderr, honoring `RUST_LOG`.
///
/// Safe to call more than once: later calls are no-ops once a global
/// subscriber is set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
