//! Logging setup for the process log binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host process. `init` is what the CLI uses.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Install a stderr fmt subscriber filtered by `level`.
///
/// `level` accepts a plain level ("debug") or `RUST_LOG` style directives.
/// Unparseable filters fall back to "info".
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::InvalidState(format!("Failed to install log subscriber: {}", e)))
}
