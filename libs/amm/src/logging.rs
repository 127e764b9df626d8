//! Standardized emoji prefixes for exchange log lines
//!
//! Keeps pool event logs greppable across the registry, pairs and router.

/// Standard emoji set for exchange logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅"; // Operation succeeded
    pub const ERROR: &'static str = "❌"; // Operation failed and was rolled back
    pub const WARNING: &'static str = "⚠️"; // Recovery or unusual state

    // Module-specific
    pub const POOL: &'static str = "🏊"; // Pair creation/registry events
    pub const EXECUTE: &'static str = "⚡"; // Router execution
    pub const CLOCK: &'static str = "⏱️"; // Deadlines

    // Event types
    pub const SWAP: &'static str = "🔄"; // Swap event
    pub const MINT: &'static str = "➕"; // Mint/liquidity add
    pub const BURN: &'static str = "➖"; // Burn/liquidity remove
    pub const SYNC: &'static str = "🔃"; // Reserve sync/skim
}
