//! Error types for pair, registry and router operations
//!
//! Every failure aborts the enclosing operation; nothing is partially
//! committed. Variants are grouped into categories so callers can decide
//! whether a retry with corrected input makes sense.

use ethers_core::types::{Address, U256};
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, AmmError>;

/// Broad classification of an [`AmmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or stale caller input; safe to retry with corrected arguments
    Precondition,
    /// A value left the supported numeric domain
    Arithmetic,
    /// The operation would break an economic guarantee
    Invariant,
    /// The token collaborator refused a transfer
    Transfer,
}

/// Errors raised by the exchange core
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    #[error("Identical tokens: {0:?}")]
    IdenticalTokens(Address),

    #[error("Null token address")]
    ZeroToken,

    #[error("Pair already exists for ({token0:?}, {token1:?})")]
    PairExists { token0: Address, token1: Address },

    #[error("No pair for ({token_a:?}, {token_b:?})")]
    PairNotFound { token_a: Address, token_b: Address },

    #[error("Deadline {deadline} expired (now {now})")]
    Expired { deadline: u64, now: u64 },

    #[error("Invalid path: at least two tokens required, got {0}")]
    InvalidPath(usize),

    #[error("Invalid recipient: {0:?} is one of the pair tokens")]
    InvalidTo(Address),

    #[error("Minimum liquidity shares held by the null address are locked")]
    LockedShares,

    #[error("Invalid pair configuration: {0}")]
    InvalidConfig(String),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Arithmetic underflow")]
    ArithmeticUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Constant-product invariant violated")]
    InvariantViolation,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Insufficient initial liquidity: sqrt(amount0 * amount1) = {root} <= lock {minimum}")]
    InsufficientInitialLiquidity { root: U256, minimum: U256 },

    #[error("Insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("Insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    #[error("Insufficient output amount")]
    InsufficientOutputAmount,

    #[error("Insufficient input amount")]
    InsufficientInputAmount,

    #[error("Insufficient A amount")]
    InsufficientAAmount,

    #[error("Insufficient B amount")]
    InsufficientBAmount,

    #[error("Excessive input amount: required {required}, max {max}")]
    ExcessiveInputAmount { required: U256, max: U256 },

    #[error("Transfer of {amount} {token:?} from {from:?} to {to:?} failed")]
    TransferFailed {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
}

impl AmmError {
    /// Category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        use AmmError::*;
        match self {
            IdenticalTokens(_)
            | ZeroToken
            | PairExists { .. }
            | PairNotFound { .. }
            | Expired { .. }
            | InvalidPath(_)
            | InvalidTo(_)
            | LockedShares
            | InvalidConfig(_) => ErrorCategory::Precondition,
            ArithmeticOverflow | ArithmeticUnderflow | DivisionByZero => {
                ErrorCategory::Arithmetic
            }
            TransferFailed { .. } => ErrorCategory::Transfer,
            InvariantViolation
            | InsufficientLiquidity
            | InsufficientInitialLiquidity { .. }
            | InsufficientLiquidityMinted
            | InsufficientLiquidityBurned
            | InsufficientOutputAmount
            | InsufficientInputAmount
            | InsufficientAAmount
            | InsufficientBAmount
            | ExcessiveInputAmount { .. } => ErrorCategory::Invariant,
        }
    }
}
