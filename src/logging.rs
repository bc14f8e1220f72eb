//! Opt-in tracing setup for binaries and test harnesses.
//!
//! The library itself only emits `tracing` events; it never installs a
//! subscriber. Hosts that want console output call [`init_logging`] once.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize a console subscriber filtered by `RUST_LOG`
/// (default `conductor_data=info`). Safe to call more than once.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("conductor_data=info"));

        // A subscriber may already be installed by the host; ignore that.
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
