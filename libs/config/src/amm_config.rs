//! Exchange Configuration Module
//!
//! Provides configuration loading and validation for the exchange core.
//! Supports loading from TOML files with environment variable overrides.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main exchange configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AmmConfig {
    /// Tracing filter directive (`info`, `dex_amm=debug`, ...)
    pub log_level: String,

    /// Parameters copied into every pair the registry creates
    pub pair: PairConfig,
}

/// Per-pair economic parameters
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PairConfig {
    /// Swap fee in basis points, taken on the input side
    pub fee_bps: u32,

    /// Shares permanently locked on first mint
    pub minimum_liquidity: u64,
}

impl Default for AmmConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
            pair: PairConfig::default(),
        }
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            fee_bps: defaults::FEE_BPS,
            minimum_liquidity: defaults::MINIMUM_LIQUIDITY,
        }
    }
}

impl PairConfig {
    /// Validate economic parameters
    pub fn validate(&self) -> Result<()> {
        if self.fee_bps >= defaults::BPS_DENOMINATOR {
            bail!(
                "fee_bps must be below {} (got {})",
                defaults::BPS_DENOMINATOR,
                self.fee_bps
            );
        }

        if self.minimum_liquidity == 0 {
            bail!("minimum_liquidity must be positive");
        }

        Ok(())
    }
}

impl AmmConfig {
    /// Load configuration from a TOML file with environment overrides
    ///
    /// An explicit `path` must exist. Without one, `config/dex.toml` is
    /// used when present and defaults apply otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                info!("Loading exchange config: {:?}", path);
                File::from(path).required(true)
            }
            None => {
                debug!("Loading default exchange config: {}", defaults::CONFIG_PATH);
                File::with_name(defaults::CONFIG_PATH).required(false)
            }
        };

        // Override with environment variables (DEX_ prefix, `__` between sections)
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.log_level)
            .with_context(|| format!("Invalid log_level directive '{}'", self.log_level))?;

        self.pair.validate().context("Invalid [pair] section")
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(path: Option<&Path>) -> Result<AmmConfig> {
    AmmConfig::load(path)
}
