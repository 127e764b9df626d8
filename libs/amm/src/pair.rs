//! Constant-product pair
//!
//! A [`Pair`] owns the reserves of one canonical token pair, the ledger of
//! liquidity shares issued against them, and the time-weighted price
//! accumulators. Every mutating operation re-reads the pair's real token
//! balances from the [`TokenLedger`] instead of trusting amounts supplied
//! by the caller, and commits its own state only after every check passed.
//!
//! Operations follow a "transfer first, then call" pattern: a depositor
//! moves tokens (or shares, for `burn`) to [`Pair::address`] and then calls
//! the pair, which attributes the observed balance delta.

use crate::error::{AmmError, Result};
use crate::logging::LogEmoji;
use crate::math::{self, checked_add, checked_mul, checked_sub, mul_div};
use crate::token::{atomic, safe_transfer, TokenLedger};
use crate::v2_math::V2Math;
use dex_config::defaults::BPS_DENOMINATOR;
use dex_config::PairConfig;
use ethers_core::types::{Address, U256, U512};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Last synchronized reserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub reserve0: U256,
    pub reserve1: U256,
    pub block_timestamp_last: u64,
}

/// Macro-state of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairStatus {
    /// No shares outstanding; the next mint seeds the pool
    Uninitialized,
    /// Shares outstanding
    Active,
}

/// Events recorded by committed pair operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairEvent {
    Mint {
        to: Address,
        amount0: U256,
        amount1: U256,
        liquidity: U256,
    },
    Burn {
        to: Address,
        amount0: U256,
        amount1: U256,
        liquidity: U256,
    },
    Swap {
        to: Address,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
    },
    Sync {
        reserve0: U256,
        reserve1: U256,
    },
}

/// Number of most recent events a pair retains
pub const EVENT_LOG_CAPACITY: usize = 256;

/// Bounded log of the most recent pair events
///
/// Oldest entries are evicted once `EVENT_LOG_CAPACITY` is reached.
/// `recorded` counts every event ever pushed so a rollback can drop the
/// entries a failed call added.
#[derive(Debug, Clone, Default)]
struct EventLog {
    entries: VecDeque<PairEvent>,
    recorded: u64,
}

impl EventLog {
    fn push(&mut self, event: PairEvent) {
        if self.entries.len() == EVENT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
        self.recorded += 1;
    }

    fn drain(&mut self) -> Vec<PairEvent> {
        self.entries.drain(..).collect()
    }

    fn rollback_to(&mut self, recorded: u64) {
        let added = self.recorded.saturating_sub(recorded);
        for _ in 0..added {
            if self.entries.pop_back().is_none() {
                break;
            }
        }
        self.recorded = self.recorded.min(recorded);
    }
}

/// Restorable copy of a pair's mutable state, without its event history
#[derive(Debug, Clone)]
pub struct PairSnapshot {
    reserve0: U256,
    reserve1: U256,
    block_timestamp_last: u64,
    price0_cumulative_last: U256,
    price1_cumulative_last: U256,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    events_recorded: u64,
}

/// Reserve and accumulator values computed before they are committed
struct ReserveUpdate {
    reserve0: U256,
    reserve1: U256,
    block_timestamp: u64,
    price0_cumulative: U256,
    price1_cumulative: U256,
}

/// Complete state of a single pair
#[derive(Debug, Clone)]
pub struct Pair {
    address: Address,
    token0: Address,
    token1: Address,
    fee_bps: u32,
    minimum_liquidity: U256,

    reserve0: U256,
    reserve1: U256,
    block_timestamp_last: u64,
    price0_cumulative_last: U256,
    price1_cumulative_last: U256,

    // Liquidity share ledger
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,

    events: EventLog,
}

impl Pair {
    /// Create an empty pair holding its balances at `address`
    ///
    /// Tokens are stored in canonical (ascending) order regardless of the
    /// order they are passed in.
    pub fn new(
        address: Address,
        token_a: Address,
        token_b: Address,
        config: &PairConfig,
    ) -> Result<Self> {
        let (token0, token1) = V2Math::sort_tokens(token_a, token_b)?;
        Ok(Self {
            address,
            token0,
            token1,
            fee_bps: config.fee_bps,
            minimum_liquidity: U256::from(config.minimum_liquidity),
            reserve0: U256::zero(),
            reserve1: U256::zero(),
            block_timestamp_last: 0,
            price0_cumulative_last: U256::zero(),
            price1_cumulative_last: U256::zero(),
            total_supply: U256::zero(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            events: EventLog::default(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token0(&self) -> Address {
        self.token0
    }

    pub fn token1(&self) -> Address {
        self.token1
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    pub fn minimum_liquidity(&self) -> U256 {
        self.minimum_liquidity
    }

    pub fn get_reserves(&self) -> Reserves {
        Reserves {
            reserve0: self.reserve0,
            reserve1: self.reserve1,
            block_timestamp_last: self.block_timestamp_last,
        }
    }

    /// Reserves ordered as `(reserve of token_in, reserve of the other token)`
    pub fn reserves_for(&self, token_in: Address) -> Option<(U256, U256)> {
        if token_in == self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if token_in == self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }

    pub fn price0_cumulative_last(&self) -> U256 {
        self.price0_cumulative_last
    }

    pub fn price1_cumulative_last(&self) -> U256 {
        self.price1_cumulative_last
    }

    pub fn status(&self) -> PairStatus {
        if self.total_supply.is_zero() {
            PairStatus::Uninitialized
        } else {
            PairStatus::Active
        }
    }

    /// Spot price (token1 per token0), informational only
    ///
    /// `None` if the pair is empty or a reserve exceeds `Decimal` range.
    pub fn spot_price(&self) -> Option<Decimal> {
        // Reserves are capped at 112 bits
        let reserve0 = Decimal::from_u128(self.reserve0.as_u128())?;
        let reserve1 = Decimal::from_u128(self.reserve1.as_u128())?;
        reserve1.checked_div(reserve0)
    }

    /// Drain the retained events, oldest first
    ///
    /// At most [`EVENT_LOG_CAPACITY`] of the most recent events are kept
    /// between calls.
    pub fn take_events(&mut self) -> Vec<PairEvent> {
        self.events.drain()
    }

    /// Total number of events recorded over the pair's lifetime
    pub fn events_recorded(&self) -> u64 {
        self.events.recorded
    }

    /// Capture reserves, accumulators and the share ledger
    pub fn snapshot(&self) -> PairSnapshot {
        PairSnapshot {
            reserve0: self.reserve0,
            reserve1: self.reserve1,
            block_timestamp_last: self.block_timestamp_last,
            price0_cumulative_last: self.price0_cumulative_last,
            price1_cumulative_last: self.price1_cumulative_last,
            total_supply: self.total_supply,
            balances: self.balances.clone(),
            allowances: self.allowances.clone(),
            events_recorded: self.events.recorded,
        }
    }

    /// Return to `snapshot`, dropping events recorded after it was taken
    pub fn restore(&mut self, snapshot: PairSnapshot) {
        self.reserve0 = snapshot.reserve0;
        self.reserve1 = snapshot.reserve1;
        self.block_timestamp_last = snapshot.block_timestamp_last;
        self.price0_cumulative_last = snapshot.price0_cumulative_last;
        self.price1_cumulative_last = snapshot.price1_cumulative_last;
        self.total_supply = snapshot.total_supply;
        self.balances = snapshot.balances;
        self.allowances = snapshot.allowances;
        self.events.rollback_to(snapshot.events_recorded);
    }

    // ----- liquidity share ledger -----

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Allow `spender` to move up to `amount` of `owner`'s shares
    ///
    /// `U256::MAX` is an infinite allowance. The null address holds the
    /// locked minimum liquidity and cannot grant allowances.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        if owner.is_zero() {
            return Err(AmmError::LockedShares);
        }
        self.allowances.insert((owner, spender), amount);
        Ok(())
    }

    /// Move shares between holders
    ///
    /// Shares held by the null address never move.
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        if from.is_zero() {
            return Err(AmmError::LockedShares);
        }
        let from_balance = checked_sub(self.balance_of(from), amount)?;
        self.balances.insert(from, from_balance);
        self.credit(to, amount);
        Ok(())
    }

    /// Move shares on behalf of `from`, spending `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        if from.is_zero() {
            return Err(AmmError::LockedShares);
        }
        let allowance = self.allowance(from, spender);
        let remaining = if spender == from || allowance == U256::MAX {
            None
        } else {
            Some(checked_sub(allowance, amount)?)
        };

        self.transfer(from, to, amount)?;
        if let Some(remaining) = remaining {
            self.allowances.insert((from, spender), remaining);
        }
        Ok(())
    }

    fn credit(&mut self, holder: Address, amount: U256) {
        let balance = self.balances.entry(holder).or_default();
        *balance += amount;
    }

    // ----- pool operations -----

    /// Issue shares for tokens deposited since the last sync
    ///
    /// Returns the number of shares credited to `to`.
    pub fn mint<L>(&mut self, ledger: &mut L, to: Address, now: u64) -> Result<U256>
    where
        L: TokenLedger + ?Sized,
    {
        atomic(ledger, |ledger| self.mint_inner(ledger, to, now))
    }

    fn mint_inner<L>(&mut self, ledger: &mut L, to: Address, now: u64) -> Result<U256>
    where
        L: TokenLedger + ?Sized,
    {
        let balance0 = ledger.balance_of(self.token0, self.address);
        let balance1 = ledger.balance_of(self.token1, self.address);
        let update = self.prepare_update(balance0, balance1, now)?;

        let amount0 = checked_sub(balance0, self.reserve0)?;
        let amount1 = checked_sub(balance1, self.reserve1)?;

        let first_mint = self.total_supply.is_zero();
        let liquidity = if first_mint {
            let root = math::sqrt(checked_mul(amount0, amount1)?)?;
            if root <= self.minimum_liquidity {
                return Err(AmmError::InsufficientInitialLiquidity {
                    root,
                    minimum: self.minimum_liquidity,
                });
            }
            root - self.minimum_liquidity
        } else {
            math::min(
                mul_div(amount0, self.total_supply, self.reserve0)?,
                mul_div(amount1, self.total_supply, self.reserve1)?,
            )
        };

        if liquidity.is_zero() {
            return Err(AmmError::InsufficientLiquidityMinted);
        }

        let locked = if first_mint {
            self.minimum_liquidity
        } else {
            U256::zero()
        };
        let total_supply = checked_add(checked_add(self.total_supply, locked)?, liquidity)?;

        // Commit
        if first_mint {
            self.credit(Address::zero(), locked);
        }
        self.credit(to, liquidity);
        self.total_supply = total_supply;
        self.apply_update(update);
        self.events.push(PairEvent::Mint {
            to,
            amount0,
            amount1,
            liquidity,
        });

        debug!(
            "{} Mint on {:?}: {} / {} -> {} shares to {:?}",
            LogEmoji::MINT,
            self.address,
            amount0,
            amount1,
            liquidity,
            to
        );
        Ok(liquidity)
    }

    /// Redeem the shares held by the pair itself for the underlying tokens
    ///
    /// Returns `(amount0, amount1)` paid to `to`.
    pub fn burn<L>(&mut self, ledger: &mut L, to: Address, now: u64) -> Result<(U256, U256)>
    where
        L: TokenLedger + ?Sized,
    {
        atomic(ledger, |ledger| self.burn_inner(ledger, to, now))
    }

    fn burn_inner<L>(&mut self, ledger: &mut L, to: Address, now: u64) -> Result<(U256, U256)>
    where
        L: TokenLedger + ?Sized,
    {
        let liquidity = self.balance_of(self.address);
        if self.total_supply.is_zero() {
            return Err(AmmError::InsufficientLiquidityBurned);
        }

        let amount0 = mul_div(liquidity, self.reserve0, self.total_supply)?;
        let amount1 = mul_div(liquidity, self.reserve1, self.total_supply)?;
        if amount0.is_zero() || amount1.is_zero() {
            return Err(AmmError::InsufficientLiquidityBurned);
        }

        safe_transfer(ledger, self.token0, self.address, to, amount0)?;
        safe_transfer(ledger, self.token1, self.address, to, amount1)?;

        let balance0 = ledger.balance_of(self.token0, self.address);
        let balance1 = ledger.balance_of(self.token1, self.address);
        let update = self.prepare_update(balance0, balance1, now)?;
        let total_supply = checked_sub(self.total_supply, liquidity)?;

        // Commit
        self.balances.insert(self.address, U256::zero());
        self.total_supply = total_supply;
        self.apply_update(update);
        self.events.push(PairEvent::Burn {
            to,
            amount0,
            amount1,
            liquidity,
        });

        debug!(
            "{} Burn on {:?}: {} shares -> {} / {} to {:?}",
            LogEmoji::BURN,
            self.address,
            liquidity,
            amount0,
            amount1,
            to
        );
        Ok((amount0, amount1))
    }

    /// Pay out the requested amounts and enforce the fee-adjusted invariant
    ///
    /// Inputs must already be in the pair's balance. Both outputs may be
    /// non-zero.
    pub fn swap<L>(
        &mut self,
        ledger: &mut L,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        now: u64,
    ) -> Result<()>
    where
        L: TokenLedger + ?Sized,
    {
        atomic(ledger, |ledger| {
            self.swap_inner(ledger, amount0_out, amount1_out, to, now)
        })
    }

    fn swap_inner<L>(
        &mut self,
        ledger: &mut L,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
        now: u64,
    ) -> Result<()>
    where
        L: TokenLedger + ?Sized,
    {
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(AmmError::InsufficientOutputAmount);
        }
        if amount0_out >= self.reserve0 || amount1_out >= self.reserve1 {
            return Err(AmmError::InsufficientLiquidity);
        }
        if to == self.token0 || to == self.token1 {
            return Err(AmmError::InvalidTo(to));
        }

        // Optimistic transfers
        if !amount0_out.is_zero() {
            safe_transfer(ledger, self.token0, self.address, to, amount0_out)?;
        }
        if !amount1_out.is_zero() {
            safe_transfer(ledger, self.token1, self.address, to, amount1_out)?;
        }

        let balance0 = ledger.balance_of(self.token0, self.address);
        let balance1 = ledger.balance_of(self.token1, self.address);

        let amount0_in = observed_input(balance0, self.reserve0, amount0_out);
        let amount1_in = observed_input(balance1, self.reserve1, amount1_out);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(AmmError::InsufficientInputAmount);
        }

        // balance_adjusted = balance * 10_000 - amount_in * fee_bps
        let scale = U256::from(BPS_DENOMINATOR);
        let fee = U256::from(self.fee_bps);
        let adjusted0 = checked_sub(checked_mul(balance0, scale)?, checked_mul(amount0_in, fee)?)?;
        let adjusted1 = checked_sub(checked_mul(balance1, scale)?, checked_mul(amount1_in, fee)?)?;

        let k_after = adjusted0.full_mul(adjusted1);
        let k_before = self.reserve0.full_mul(self.reserve1) * U512::from(scale * scale);
        if k_after < k_before {
            return Err(AmmError::InvariantViolation);
        }

        let update = self.prepare_update(balance0, balance1, now)?;

        // Commit
        self.apply_update(update);
        self.events.push(PairEvent::Swap {
            to,
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
        });

        debug!(
            "{} Swap on {:?}: in {} / {} out {} / {} to {:?}",
            LogEmoji::SWAP,
            self.address,
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
            to
        );
        Ok(())
    }

    /// Send any balance above the recorded reserves to `to`
    pub fn skim<L>(&mut self, ledger: &mut L, to: Address) -> Result<(U256, U256)>
    where
        L: TokenLedger + ?Sized,
    {
        atomic(ledger, |ledger| {
            let excess0 = checked_sub(ledger.balance_of(self.token0, self.address), self.reserve0)?;
            let excess1 = checked_sub(ledger.balance_of(self.token1, self.address), self.reserve1)?;

            safe_transfer(ledger, self.token0, self.address, to, excess0)?;
            safe_transfer(ledger, self.token1, self.address, to, excess1)?;

            if !excess0.is_zero() || !excess1.is_zero() {
                warn!(
                    "{} Skimmed {} / {} from {:?} to {:?}",
                    LogEmoji::SYNC,
                    excess0,
                    excess1,
                    self.address,
                    to
                );
            }
            Ok((excess0, excess1))
        })
    }

    /// Force reserves to match the observed balances
    pub fn sync<L>(&mut self, ledger: &mut L, now: u64) -> Result<()>
    where
        L: TokenLedger + ?Sized,
    {
        let balance0 = ledger.balance_of(self.token0, self.address);
        let balance1 = ledger.balance_of(self.token1, self.address);
        let update = self.prepare_update(balance0, balance1, now)?;

        if balance0 != self.reserve0 || balance1 != self.reserve1 {
            warn!(
                "{} Sync on {:?}: reserves {} / {} -> {} / {}",
                LogEmoji::SYNC,
                self.address,
                self.reserve0,
                self.reserve1,
                balance0,
                balance1
            );
        }
        self.apply_update(update);
        Ok(())
    }

    /// Compute new reserves and accumulators without mutating the pair
    ///
    /// Accumulators integrate the price implied by the reserves that held
    /// up to `now`, so they must be derived from the pre-update reserves.
    fn prepare_update(&self, balance0: U256, balance1: U256, now: u64) -> Result<ReserveUpdate> {
        let max = math::max_reserve();
        if balance0 > max || balance1 > max {
            return Err(AmmError::ArithmeticOverflow);
        }

        let mut price0_cumulative = self.price0_cumulative_last;
        let mut price1_cumulative = self.price1_cumulative_last;

        // A clock running backwards accrues nothing
        let elapsed = now.saturating_sub(self.block_timestamp_last);
        if elapsed > 0 && !self.reserve0.is_zero() && !self.reserve1.is_zero() {
            let elapsed = U256::from(elapsed);
            let price0 = math::uq_div(math::encode_uq112x112(self.reserve1)?, self.reserve0)?;
            let price1 = math::uq_div(math::encode_uq112x112(self.reserve0)?, self.reserve1)?;
            price0_cumulative = checked_add(price0_cumulative, checked_mul(price0, elapsed)?)?;
            price1_cumulative = checked_add(price1_cumulative, checked_mul(price1, elapsed)?)?;
        }

        Ok(ReserveUpdate {
            reserve0: balance0,
            reserve1: balance1,
            block_timestamp: self.block_timestamp_last.max(now),
            price0_cumulative,
            price1_cumulative,
        })
    }

    fn apply_update(&mut self, update: ReserveUpdate) {
        self.reserve0 = update.reserve0;
        self.reserve1 = update.reserve1;
        self.block_timestamp_last = update.block_timestamp;
        self.price0_cumulative_last = update.price0_cumulative;
        self.price1_cumulative_last = update.price1_cumulative;
        self.events.push(PairEvent::Sync {
            reserve0: update.reserve0,
            reserve1: update.reserve1,
        });
    }
}

/// Input observed on one side: `balance - (reserve - amount_out)`, floored at zero
fn observed_input(balance: U256, reserve: U256, amount_out: U256) -> U256 {
    let retained = reserve - amount_out;
    if balance > retained {
        balance - retained
    } else {
        U256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryLedger;
    use rust_decimal_macros::dec;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    const PAIR: u64 = 0xaa;
    const TOKEN0: u64 = 0x10;
    const TOKEN1: u64 = 0x20;
    const ALICE: u64 = 1;
    const BOB: u64 = 2;

    fn setup(minimum_liquidity: u64) -> (Pair, MemoryLedger) {
        let config = PairConfig {
            fee_bps: 30,
            minimum_liquidity,
        };
        let pair = Pair::new(addr(PAIR), addr(TOKEN1), addr(TOKEN0), &config).unwrap();
        (pair, MemoryLedger::new())
    }

    fn deposit(ledger: &mut MemoryLedger, amount0: u64, amount1: u64) {
        ledger.mint(addr(TOKEN0), addr(PAIR), u(amount0)).unwrap();
        ledger.mint(addr(TOKEN1), addr(PAIR), u(amount1)).unwrap();
    }

    fn share_sum(pair: &Pair) -> U256 {
        pair.balances.values().fold(U256::zero(), |acc, b| acc + *b)
    }

    #[test]
    fn test_tokens_are_canonically_ordered() {
        let (pair, _) = setup(1_000);
        assert_eq!(pair.token0(), addr(TOKEN0));
        assert_eq!(pair.token1(), addr(TOKEN1));
        assert_eq!(pair.status(), PairStatus::Uninitialized);
    }

    #[test]
    fn test_first_mint_locks_minimum_liquidity() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 10_000);

        let shares = pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        assert_eq!(shares, u(9_000));
        assert_eq!(pair.balance_of(addr(ALICE)), u(9_000));
        assert_eq!(pair.balance_of(Address::zero()), u(1_000));
        assert_eq!(pair.total_supply(), u(10_000));
        assert_eq!(pair.status(), PairStatus::Active);
        assert_eq!(pair.get_reserves().reserve0, u(10_000));
        assert_eq!(share_sum(&pair), pair.total_supply());
    }

    #[test]
    fn test_first_mint_degeneracy_guard() {
        let (mut pair, mut ledger) = setup(1_000);
        // 999 * 1000 < 1000^2
        deposit(&mut ledger, 999, 1_000);

        let err = pair.mint(&mut ledger, addr(ALICE), 1).unwrap_err();
        assert!(matches!(err, AmmError::InsufficientInitialLiquidity { .. }));
        assert_eq!(pair.status(), PairStatus::Uninitialized);
        assert!(pair.get_reserves().reserve0.is_zero());
        assert!(pair.take_events().is_empty());
    }

    #[test]
    fn test_subsequent_mint_takes_minimum_claim() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 40_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();
        let total = pair.total_supply();

        // Unbalanced: twice the token0 share of token1
        deposit(&mut ledger, 2_000, 4_000);
        let shares = pair.mint(&mut ledger, addr(BOB), 2).unwrap();

        let expected = math::min(u(2_000) * total / u(10_000), u(4_000) * total / u(40_000));
        assert_eq!(shares, expected);
        assert_eq!(shares, total / 10);
        assert_eq!(share_sum(&pair), pair.total_supply());
    }

    #[test]
    fn test_mint_without_deposit_fails() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 10_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        assert_eq!(
            pair.mint(&mut ledger, addr(ALICE), 2),
            Err(AmmError::InsufficientLiquidityMinted)
        );
    }

    #[test]
    fn test_swap_scenario_accepts_quote_and_rejects_one_more() {
        let (mut pair, mut ledger) = setup(10);
        deposit(&mut ledger, 1_000, 1_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        let quoted = V2Math::get_amount_out(u(100), u(1_000), u(1_000), 30).unwrap();
        assert_eq!(quoted, u(90));

        // One more than the quote fails and leaves everything untouched
        let mut rejected = pair.clone();
        let mut rejected_ledger = ledger.clone();
        rejected_ledger.mint(addr(TOKEN0), addr(PAIR), u(100)).unwrap();
        assert_eq!(
            rejected.swap(&mut rejected_ledger, U256::zero(), quoted + 1, addr(BOB), 2),
            Err(AmmError::InvariantViolation)
        );
        assert_eq!(rejected_ledger.balance_of(addr(TOKEN1), addr(BOB)), U256::zero());
        assert_eq!(rejected.get_reserves(), pair.get_reserves());

        ledger.mint(addr(TOKEN0), addr(PAIR), u(100)).unwrap();
        pair.swap(&mut ledger, U256::zero(), quoted, addr(BOB), 2)
            .unwrap();

        assert_eq!(ledger.balance_of(addr(TOKEN1), addr(BOB)), u(90));
        let reserves = pair.get_reserves();
        assert_eq!(reserves.reserve0, u(1_100));
        assert_eq!(reserves.reserve1, u(910));
        assert!(reserves.reserve0 * reserves.reserve1 >= u(1_000_000));
    }

    #[test]
    fn test_dual_sided_swap() {
        let (mut pair, mut ledger) = setup(10);
        deposit(&mut ledger, 1_000, 1_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        // Deposit 100 of each, take 50 of each back out
        deposit(&mut ledger, 100, 100);
        pair.swap(&mut ledger, u(50), u(50), addr(BOB), 2).unwrap();

        assert_eq!(ledger.balance_of(addr(TOKEN0), addr(BOB)), u(50));
        assert_eq!(ledger.balance_of(addr(TOKEN1), addr(BOB)), u(50));
        let events = pair.take_events();
        assert!(events.contains(&PairEvent::Swap {
            to: addr(BOB),
            amount0_in: u(100),
            amount1_in: u(100),
            amount0_out: u(50),
            amount1_out: u(50),
        }));

        // Taking out more than was put in on both sides breaks the invariant
        deposit(&mut ledger, 10, 10);
        assert_eq!(
            pair.swap(&mut ledger, u(15), u(15), addr(BOB), 3),
            Err(AmmError::InvariantViolation)
        );
    }

    #[test]
    fn test_swap_preconditions() {
        let (mut pair, mut ledger) = setup(10);
        deposit(&mut ledger, 1_000, 1_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        assert_eq!(
            pair.swap(&mut ledger, U256::zero(), U256::zero(), addr(BOB), 2),
            Err(AmmError::InsufficientOutputAmount)
        );
        assert_eq!(
            pair.swap(&mut ledger, u(1_000), U256::zero(), addr(BOB), 2),
            Err(AmmError::InsufficientLiquidity)
        );
        assert_eq!(
            pair.swap(&mut ledger, u(1), U256::zero(), addr(TOKEN1), 2),
            Err(AmmError::InvalidTo(addr(TOKEN1)))
        );
        assert_eq!(
            pair.swap(&mut ledger, u(1), U256::zero(), addr(BOB), 2),
            Err(AmmError::InsufficientInputAmount)
        );
        // Optimistic transfer of the failed swap was undone
        assert_eq!(ledger.balance_of(addr(TOKEN0), addr(BOB)), U256::zero());
        assert_eq!(ledger.balance_of(addr(TOKEN0), addr(PAIR)), u(1_000));
    }

    #[test]
    fn test_burn_returns_proportional_amounts() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 20_000);
        let shares = pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        pair.transfer(addr(ALICE), addr(PAIR), shares).unwrap();
        let (amount0, amount1) = pair.burn(&mut ledger, addr(ALICE), 2).unwrap();

        let total = shares + u(1_000);
        assert_eq!(amount0, shares * u(10_000) / total);
        assert_eq!(amount1, shares * u(20_000) / total);
        assert_eq!(ledger.balance_of(addr(TOKEN0), addr(ALICE)), amount0);
        assert_eq!(pair.total_supply(), u(1_000));
        assert_eq!(pair.get_reserves().reserve0, u(10_000) - amount0);
        assert_eq!(pair.status(), PairStatus::Active);
        assert_eq!(share_sum(&pair), pair.total_supply());
    }

    #[test]
    fn test_burn_without_shares_fails() {
        let (mut pair, mut ledger) = setup(1_000);
        assert_eq!(
            pair.burn(&mut ledger, addr(ALICE), 1),
            Err(AmmError::InsufficientLiquidityBurned)
        );

        deposit(&mut ledger, 10_000, 10_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();
        assert_eq!(
            pair.burn(&mut ledger, addr(ALICE), 2),
            Err(AmmError::InsufficientLiquidityBurned)
        );
    }

    #[test]
    fn test_burn_then_mint_never_gains_shares() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 12_345, 67_890);
        let shares = pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        let half = shares / 2;
        pair.transfer(addr(ALICE), addr(PAIR), half).unwrap();
        let (amount0, amount1) = pair.burn(&mut ledger, addr(ALICE), 2).unwrap();

        assert!(ledger.transfer(addr(TOKEN0), addr(ALICE), addr(PAIR), amount0));
        assert!(ledger.transfer(addr(TOKEN1), addr(ALICE), addr(PAIR), amount1));
        let reminted = pair.mint(&mut ledger, addr(ALICE), 3).unwrap();

        assert!(reminted <= half);
        assert!(pair.balance_of(addr(ALICE)) <= shares);
    }

    #[test]
    fn test_skim_and_sync() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 10_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        // Direct donation
        deposit(&mut ledger, 500, 0);
        let (excess0, excess1) = pair.skim(&mut ledger, addr(BOB)).unwrap();
        assert_eq!((excess0, excess1), (u(500), U256::zero()));
        assert_eq!(ledger.balance_of(addr(TOKEN0), addr(BOB)), u(500));
        assert_eq!(pair.get_reserves().reserve0, u(10_000));

        deposit(&mut ledger, 0, 700);
        pair.sync(&mut ledger, 2).unwrap();
        let reserves = pair.get_reserves();
        assert_eq!(reserves.reserve1, u(10_700));
        assert_eq!(
            reserves.reserve1,
            ledger.balance_of(addr(TOKEN1), addr(PAIR))
        );
    }

    #[test]
    fn test_price_accumulators() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 20_000);
        pair.mint(&mut ledger, addr(ALICE), 100).unwrap();
        assert!(pair.price0_cumulative_last().is_zero());

        deposit(&mut ledger, 0, 0);
        pair.sync(&mut ledger, 110).unwrap();

        let price0 = (u(20_000) << math::RESOLUTION) / u(10_000);
        let price1 = (u(10_000) << math::RESOLUTION) / u(20_000);
        assert_eq!(pair.price0_cumulative_last(), price0 * u(10));
        assert_eq!(pair.price1_cumulative_last(), price1 * u(10));
        assert_eq!(pair.get_reserves().block_timestamp_last, 110);

        // Same timestamp and a clock running backwards accrue nothing
        pair.sync(&mut ledger, 110).unwrap();
        pair.sync(&mut ledger, 50).unwrap();
        assert_eq!(pair.price0_cumulative_last(), price0 * u(10));
        assert_eq!(pair.get_reserves().block_timestamp_last, 110);
    }

    #[test]
    fn test_reserve_width_enforced() {
        let (mut pair, mut ledger) = setup(1_000);
        let too_large = math::max_reserve() + 1;
        ledger.mint(addr(TOKEN0), addr(PAIR), too_large).unwrap();
        ledger.mint(addr(TOKEN1), addr(PAIR), u(10_000)).unwrap();

        assert_eq!(
            pair.mint(&mut ledger, addr(ALICE), 1),
            Err(AmmError::ArithmeticOverflow)
        );
        assert_eq!(pair.sync(&mut ledger, 1), Err(AmmError::ArithmeticOverflow));
    }

    #[test]
    fn test_share_allowances() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 10_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        assert_eq!(
            pair.transfer_from(addr(BOB), addr(ALICE), addr(BOB), u(10)),
            Err(AmmError::ArithmeticUnderflow)
        );

        pair.approve(addr(ALICE), addr(BOB), u(100)).unwrap();
        pair.transfer_from(addr(BOB), addr(ALICE), addr(BOB), u(60))
            .unwrap();
        assert_eq!(pair.allowance(addr(ALICE), addr(BOB)), u(40));
        assert_eq!(pair.balance_of(addr(BOB)), u(60));

        assert_eq!(
            pair.transfer(addr(BOB), addr(ALICE), u(61)),
            Err(AmmError::ArithmeticUnderflow)
        );
        assert_eq!(share_sum(&pair), pair.total_supply());
    }

    #[test]
    fn test_spot_price() {
        let (mut pair, mut ledger) = setup(1_000);
        assert_eq!(pair.spot_price(), None);

        deposit(&mut ledger, 10_000, 25_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();
        assert_eq!(pair.spot_price(), Some(dec!(2.5)));
    }

    #[test]
    fn test_locked_minimum_liquidity_cannot_move() {
        let (mut pair, mut ledger) = setup(1_000);
        deposit(&mut ledger, 10_000, 10_000);
        let shares = pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        let null = Address::zero();
        assert_eq!(
            pair.transfer(null, addr(ALICE), u(1_000)),
            Err(AmmError::LockedShares)
        );
        assert_eq!(
            pair.transfer_from(addr(ALICE), null, addr(ALICE), u(1_000)),
            Err(AmmError::LockedShares)
        );
        assert_eq!(
            pair.transfer_from(null, null, addr(PAIR), u(1_000)),
            Err(AmmError::LockedShares)
        );
        assert_eq!(
            pair.approve(null, addr(ALICE), U256::MAX),
            Err(AmmError::LockedShares)
        );
        assert_eq!(pair.balance_of(null), u(1_000));

        // Burning every unlocked share leaves the pool seeded
        pair.transfer(addr(ALICE), addr(PAIR), shares).unwrap();
        pair.burn(&mut ledger, addr(ALICE), 2).unwrap();
        assert_eq!(pair.total_supply(), u(1_000));
        assert_eq!(pair.status(), PairStatus::Active);
        assert_eq!(pair.get_reserves().reserve0, u(1_000));
        assert_eq!(share_sum(&pair), pair.total_supply());
    }

    #[test]
    fn test_event_log_is_bounded() {
        let (mut pair, mut ledger) = setup(10);
        deposit(&mut ledger, 1_000_000, 1_000_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();

        for i in 0..1_000u64 {
            let reserves = pair.get_reserves();
            let out =
                V2Math::get_amount_out(u(1_000), reserves.reserve0, reserves.reserve1, 30).unwrap();
            deposit(&mut ledger, 1_000, 0);
            pair.swap(&mut ledger, U256::zero(), out, addr(BOB), 2 + i)
                .unwrap();
        }

        assert_eq!(pair.events_recorded(), 2_002);
        let events = pair.take_events();
        assert_eq!(events.len(), EVENT_LOG_CAPACITY);
        assert!(matches!(events.last(), Some(PairEvent::Swap { .. })));
        assert!(pair.take_events().is_empty());
    }

    #[test]
    fn test_restore_discards_state_and_events() {
        let (mut pair, mut ledger) = setup(10);
        deposit(&mut ledger, 1_000, 1_000);
        pair.mint(&mut ledger, addr(ALICE), 1).unwrap();
        pair.take_events();

        let reserves = pair.get_reserves();
        let recorded = pair.events_recorded();
        let snapshot = pair.snapshot();

        deposit(&mut ledger, 100, 0);
        pair.swap(&mut ledger, U256::zero(), u(90), addr(BOB), 5)
            .unwrap();
        pair.transfer(addr(ALICE), addr(BOB), u(10)).unwrap();

        pair.restore(snapshot);
        assert_eq!(pair.get_reserves(), reserves);
        assert_eq!(pair.balance_of(addr(BOB)), U256::zero());
        assert_eq!(pair.events_recorded(), recorded);
        assert!(pair.take_events().is_empty());
    }
}
