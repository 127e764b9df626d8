//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit `tracing` events; binaries and
//! integration tests call [`init_tracing`] once to install a subscriber.

use crate::AmmConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `config.log_level`
///
/// `RUST_LOG` takes precedence when set. Returns an error if a global
/// subscriber is already installed.
pub fn init_tracing(config: &AmmConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
