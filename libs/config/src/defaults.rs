//! Exchange defaults
//!
//! Constants shared by the configuration layer and the exchange core.
//! Changing any of these changes pool economics, so they are only used
//! as serde defaults; deployments override them through [`crate::AmmConfig`].

/// Swap fee taken on the input side, in basis points (30 = 0.3%)
pub const FEE_BPS: u32 = 30;

/// Basis point denominator used by every fee calculation
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Shares locked to the null address on a pair's first mint
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Bit width of a pair reserve; balances above `2^112 - 1` cannot be synced
pub const RESERVE_BITS: usize = 112;

/// Default log filter when none is configured
pub const LOG_LEVEL: &str = "info";

/// Default configuration file location
pub const CONFIG_PATH: &str = "config/dex.toml";

/// Prefix for environment variable overrides (`DEX_PAIR__FEE_BPS=25`)
pub const ENV_PREFIX: &str = "DEX";
