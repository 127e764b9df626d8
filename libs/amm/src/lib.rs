//! # DEX AMM Library - Constant-Product Exchange Core
//!
//! ## Purpose
//!
//! Exchange engine for two-token liquidity pools priced by the constant-product
//! rule `x * y = k`. Liquidity providers deposit token pairs and receive
//! fungible shares; traders swap one token for another against pooled reserves
//! and pay a proportional fee that accrues to the pool.
//!
//! ## Integration Points
//!
//! - **Token balances**: any [`TokenLedger`] implementation; [`MemoryLedger`]
//!   ships for simulations and tests
//! - **Time**: any [`Clock`]; deadlines and price accumulators read it
//! - **Configuration**: [`dex_config::PairConfig`] fixes the fee and the
//!   permanently locked share amount of every pair a [`Registry`] creates
//! - **Precision**: 256-bit integers throughout, 512-bit intermediates for
//!   products, floor rounding in favour of the pool
//!
//! ## Architecture Role
//!
//! ```text
//! caller -> Router -> Registry -> Pair (locked) -> TokenLedger
//!                \-> V2Math quotes   \-> math (checked, UQ112x112)
//! ```
//!
//! The [`Router`] resolves pairs through the [`Registry`], quotes with
//! [`V2Math`], moves tokens and drives [`Pair`] operations. A pair trusts
//! nothing the router computed: it re-reads balances and re-checks the
//! fee-adjusted invariant on every operation.
//!
//! ## Guarantees
//!
//! - Every operation is all-or-nothing; a failure leaves reserves, share
//!   balances and token balances unchanged
//! - Reserves never exceed `2^112 - 1`
//! - The first `minimum_liquidity` shares of every pool are locked forever

pub mod clock;
pub mod error;
pub mod logging;
pub mod math;
pub mod pair;
pub mod registry;
pub mod router;
pub mod token;
pub mod v2_math;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AmmError, ErrorCategory, Result};
pub use pair::{Pair, PairEvent, PairSnapshot, PairStatus, Reserves, EVENT_LOG_CAPACITY};
pub use registry::{PairHandle, Registry};
pub use router::Router;
pub use token::{Checkpoint, MemoryLedger, TokenLedger};
pub use v2_math::V2Math;

/// Common types for AMM calculations
pub use ethers_core::types::{Address, U256};
pub use rust_decimal::Decimal;
