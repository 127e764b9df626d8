//! # DEX Centralized Configuration
//!
//! This crate provides the configuration surface and defaults for the
//! exchange core, so the registry, pairs and router all agree on fee and
//! liquidity-lock parameters.
//!
//! ## Features
//!
//! - **Defaults**: Fee basis points, minimum liquidity lock, reserve width
//! - **Typed Configuration**: [`AmmConfig`] / [`PairConfig`] with serde defaults
//! - **Loading**: TOML files with `DEX_` environment overrides
//! - **Logging**: tracing-subscriber initialisation driven by the config
//!
//! ## Usage
//!
//! ```rust
//! use dex_config::{defaults, PairConfig};
//!
//! let pair = PairConfig::default();
//! assert_eq!(pair.fee_bps, defaults::FEE_BPS);
//! assert_eq!(pair.minimum_liquidity, defaults::MINIMUM_LIQUIDITY);
//! ```

pub mod amm_config;
pub mod defaults;
pub mod logging;

// Re-export commonly used types
pub use amm_config::{load_config, AmmConfig, PairConfig};
pub use logging::init_tracing;
