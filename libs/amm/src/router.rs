//! Router
//!
//! Stateless entry point for traders and liquidity providers. The router
//! quotes along token paths, moves the caller's tokens into pairs and
//! drives the pair operations. It never writes pair state directly; every
//! amount it computes is re-derived and re-validated by the pair.
//!
//! ## Atomicity
//!
//! Each state-changing call locks every pair it touches (deduplicated, in
//! ascending address order), snapshots them, and opens a ledger
//! checkpoint. Any failure restores the snapshots and reverts the ledger,
//! so a failed call leaves balances and reserves exactly as it found them.

use crate::clock::Clock;
use crate::error::{AmmError, Result};
use crate::logging::LogEmoji;
use crate::math::checked_sub;
use crate::pair::{Pair, PairSnapshot};
use crate::registry::{PairHandle, Registry};
use crate::token::{safe_transfer_from, TokenLedger};
use crate::v2_math::V2Math;
use ethers_core::types::{Address, U256};
use parking_lot::MutexGuard;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pairs along a path, deduplicated and sorted by address
struct PathPairs {
    handles: Vec<PairHandle>,
    /// Hop `i` (path[i] -> path[i + 1]) uses `handles[hops[i]]`
    hops: Vec<usize>,
}

type Guards<'a> = Vec<MutexGuard<'a, Pair>>;

pub struct Router {
    address: Address,
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
}

impl Router {
    pub fn new(address: Address, registry: Arc<Registry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            address,
            registry,
            clock,
        }
    }

    /// Address the router spends allowances as
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ----- quoting -----

    /// Output for an exact input against the given reserves
    pub fn get_amount_out(
        &self,
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256> {
        V2Math::get_amount_out(
            amount_in,
            reserve_in,
            reserve_out,
            self.registry.config().fee_bps,
        )
    }

    /// Minimal input covering an exact output against the given reserves
    pub fn get_amount_in(
        &self,
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256> {
        V2Math::get_amount_in(
            amount_out,
            reserve_in,
            reserve_out,
            self.registry.config().fee_bps,
        )
    }

    pub fn quote(&self, amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256> {
        V2Math::quote(amount_a, reserve_a, reserve_b)
    }

    /// Chained exact-input quotes along `path` at current reserves
    pub fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>> {
        let pairs = self.resolve_path(path)?;
        let guards = lock_all(&pairs.handles);
        amounts_out(&guards, &pairs.hops, amount_in, path)
    }

    /// Chained exact-output quotes along `path` at current reserves
    pub fn get_amounts_in(&self, amount_out: U256, path: &[Address]) -> Result<Vec<U256>> {
        let pairs = self.resolve_path(path)?;
        let guards = lock_all(&pairs.handles);
        amounts_in(&guards, &pairs.hops, amount_out, path)
    }

    // ----- swaps -----

    /// Swap exactly `amount_in` of `path[0]` for at least `amount_out_min`
    /// of the last token in `path`
    ///
    /// Returns the amount at every step of the path.
    pub fn swap_exact_tokens_for_tokens<L>(
        &self,
        ledger: &mut L,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>>
    where
        L: TokenLedger + ?Sized,
    {
        let now = self.ensure(deadline)?;
        let pairs = self.resolve_path(path)?;
        let mut guards = lock_all(&pairs.handles);

        let amounts = execute(ledger, &mut guards, |ledger, guards| {
            let amounts = amounts_out(guards, &pairs.hops, amount_in, path)?;
            if amounts[amounts.len() - 1] < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }

            let first_pair = guards[pairs.hops[0]].address();
            safe_transfer_from(ledger, path[0], self.address, caller, first_pair, amounts[0])?;
            swap_along(ledger, guards, &pairs.hops, &amounts, path, to, now)?;
            Ok(amounts)
        })?;

        info!(
            "{} Swapped {} -> {} over {} hop(s) for {:?}",
            LogEmoji::EXECUTE,
            amounts[0],
            amounts[amounts.len() - 1],
            pairs.hops.len(),
            to
        );
        Ok(amounts)
    }

    /// Swap at most `amount_in_max` of `path[0]` for exactly `amount_out`
    /// of the last token in `path`
    pub fn swap_tokens_for_exact_tokens<L>(
        &self,
        ledger: &mut L,
        caller: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>>
    where
        L: TokenLedger + ?Sized,
    {
        let now = self.ensure(deadline)?;
        let pairs = self.resolve_path(path)?;
        let mut guards = lock_all(&pairs.handles);

        let amounts = execute(ledger, &mut guards, |ledger, guards| {
            let amounts = amounts_in(guards, &pairs.hops, amount_out, path)?;
            if amounts[0] > amount_in_max {
                return Err(AmmError::ExcessiveInputAmount {
                    required: amounts[0],
                    max: amount_in_max,
                });
            }

            let first_pair = guards[pairs.hops[0]].address();
            safe_transfer_from(ledger, path[0], self.address, caller, first_pair, amounts[0])?;
            swap_along(ledger, guards, &pairs.hops, &amounts, path, to, now)?;
            Ok(amounts)
        })?;

        info!(
            "{} Swapped {} -> exact {} over {} hop(s) for {:?}",
            LogEmoji::EXECUTE,
            amounts[0],
            amount_out,
            pairs.hops.len(),
            to
        );
        Ok(amounts)
    }

    /// Exact-input swap for tokens that take a fee on transfer
    ///
    /// Each hop's input is what the pair actually received, and the final
    /// check is made against what `to` actually received. Returns that
    /// received amount.
    pub fn swap_exact_tokens_for_tokens_supporting_fee_on_transfer_tokens<L>(
        &self,
        ledger: &mut L,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<U256>
    where
        L: TokenLedger + ?Sized,
    {
        let now = self.ensure(deadline)?;
        let pairs = self.resolve_path(path)?;
        let mut guards = lock_all(&pairs.handles);
        let token_out = path[path.len() - 1];

        let received = execute(ledger, &mut guards, |ledger, guards| {
            let first_pair = guards[pairs.hops[0]].address();
            safe_transfer_from(ledger, path[0], self.address, caller, first_pair, amount_in)?;

            let balance_before = ledger.balance_of(token_out, to);
            for (i, &slot) in pairs.hops.iter().enumerate() {
                let (input, output) = (path[i], path[i + 1]);
                let recipient = match pairs.hops.get(i + 1) {
                    Some(&next) => guards[next].address(),
                    None => to,
                };

                let pair = &mut guards[slot];
                let (reserve_in, reserve_out) = hop_reserves(pair, input, output)?;
                let amount_input = checked_sub(ledger.balance_of(input, pair.address()), reserve_in)?;
                let amount_output =
                    V2Math::get_amount_out(amount_input, reserve_in, reserve_out, pair.fee_bps())?;

                let (amount0_out, amount1_out) = oriented_outputs(pair, input, amount_output);
                pair.swap(ledger, amount0_out, amount1_out, recipient, now)?;
            }

            let received = checked_sub(ledger.balance_of(token_out, to), balance_before)?;
            if received < amount_out_min {
                return Err(AmmError::InsufficientOutputAmount);
            }
            Ok(received)
        })?;

        info!(
            "{} Fee-on-transfer swap {} -> {} received by {:?}",
            LogEmoji::EXECUTE,
            amount_in,
            received,
            to
        );
        Ok(received)
    }

    // ----- liquidity -----

    /// Deposit up to the desired amounts at the current ratio and mint shares
    ///
    /// Creates the pair if it does not exist yet; a pair created by a call
    /// that then fails is discarded again. Returns `(amount_a, amount_b,
    /// liquidity)`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity<L>(
        &self,
        ledger: &mut L,
        caller: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: u64,
    ) -> Result<(U256, U256, U256)>
    where
        L: TokenLedger + ?Sized,
    {
        let now = self.ensure(deadline)?;
        let (token0, token1) = V2Math::sort_tokens(token_a, token_b)?;

        let mut created = false;
        let handle = match self.registry.get_pair(token0, token1) {
            Some(handle) => handle,
            None => {
                match self.registry.create_pair(token0, token1) {
                    Ok(_) => created = true,
                    // Lost a creation race; use the winner's pair
                    Err(AmmError::PairExists { .. }) => {}
                    Err(e) => return Err(e),
                }
                self.registry
                    .get_pair(token0, token1)
                    .ok_or(AmmError::PairNotFound { token_a, token_b })?
            }
        };

        let result = {
            let mut guards = vec![handle.lock()];
            execute(ledger, &mut guards, |ledger, guards| {
                let pair = &mut guards[0];
                let (amount_a, amount_b) = optimal_amounts(
                    pair,
                    token_a,
                    amount_a_desired,
                    amount_b_desired,
                    amount_a_min,
                    amount_b_min,
                )?;

                let pair_address = pair.address();
                safe_transfer_from(ledger, token_a, self.address, caller, pair_address, amount_a)?;
                safe_transfer_from(ledger, token_b, self.address, caller, pair_address, amount_b)?;
                let liquidity = pair.mint(ledger, to, now)?;
                Ok((amount_a, amount_b, liquidity))
            })
        };

        match result {
            Ok((amount_a, amount_b, liquidity)) => {
                info!(
                    "{} Added liquidity {} / {} for {} shares to {:?}",
                    LogEmoji::MINT,
                    amount_a,
                    amount_b,
                    liquidity,
                    to
                );
                Ok((amount_a, amount_b, liquidity))
            }
            Err(e) => {
                if created {
                    self.registry.discard_pair(token0, token1);
                }
                Err(e)
            }
        }
    }

    /// Burn `liquidity` of the caller's shares for the underlying tokens
    ///
    /// The router moves the shares using the caller's share allowance.
    /// Returns `(amount_a, amount_b)` in argument order.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity<L>(
        &self,
        ledger: &mut L,
        caller: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: u64,
    ) -> Result<(U256, U256)>
    where
        L: TokenLedger + ?Sized,
    {
        let now = self.ensure(deadline)?;
        let handle = self
            .registry
            .get_pair(token_a, token_b)
            .ok_or(AmmError::PairNotFound { token_a, token_b })?;
        let mut guards = vec![handle.lock()];

        let (amount_a, amount_b) = execute(ledger, &mut guards, |ledger, guards| {
            let pair = &mut guards[0];
            let pair_address = pair.address();
            pair.transfer_from(self.address, caller, pair_address, liquidity)?;
            let (amount0, amount1) = pair.burn(ledger, to, now)?;

            let (amount_a, amount_b) = if token_a == pair.token0() {
                (amount0, amount1)
            } else {
                (amount1, amount0)
            };
            if amount_a < amount_a_min {
                return Err(AmmError::InsufficientAAmount);
            }
            if amount_b < amount_b_min {
                return Err(AmmError::InsufficientBAmount);
            }
            Ok((amount_a, amount_b))
        })?;

        info!(
            "{} Removed {} shares for {} / {} to {:?}",
            LogEmoji::BURN,
            liquidity,
            amount_a,
            amount_b,
            to
        );
        Ok((amount_a, amount_b))
    }

    // ----- helpers -----

    /// Check `deadline` against the clock and return the current time
    fn ensure(&self, deadline: u64) -> Result<u64> {
        let now = self.clock.now();
        if deadline < now {
            debug!("{} Deadline {} expired at {}", LogEmoji::CLOCK, deadline, now);
            return Err(AmmError::Expired { deadline, now });
        }
        Ok(now)
    }

    fn resolve_path(&self, path: &[Address]) -> Result<PathPairs> {
        if path.len() < 2 {
            return Err(AmmError::InvalidPath(path.len()));
        }

        let mut entries: Vec<(Address, PairHandle)> = Vec::new();
        let mut hop_addresses = Vec::with_capacity(path.len() - 1);
        for hop in path.windows(2) {
            let (token_a, token_b) = (hop[0], hop[1]);
            let handle = self
                .registry
                .get_pair(token_a, token_b)
                .ok_or(AmmError::PairNotFound { token_a, token_b })?;
            let address = self.registry.pair_address(token_a, token_b)?;

            hop_addresses.push(address);
            if !entries.iter().any(|(a, _)| *a == address) {
                entries.push((address, handle));
            }
        }

        // Global lock order
        entries.sort_by_key(|(address, _)| *address);

        let hops = hop_addresses
            .iter()
            .map(|address| {
                entries
                    .binary_search_by_key(address, |(a, _)| *a)
                    .map_err(|_| AmmError::InvalidPath(path.len()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PathPairs {
            handles: entries.into_iter().map(|(_, handle)| handle).collect(),
            hops,
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("address", &self.address)
            .field("registry", &self.registry.address())
            .finish()
    }
}

fn lock_all(handles: &[PairHandle]) -> Guards<'_> {
    handles.iter().map(|handle| handle.lock()).collect()
}

/// Run `f` with the ledger checkpointed and the locked pairs snapshotted
fn execute<'g, L, T, F>(ledger: &mut L, guards: &mut [MutexGuard<'g, Pair>], f: F) -> Result<T>
where
    L: TokenLedger + ?Sized,
    F: FnOnce(&mut L, &mut [MutexGuard<'g, Pair>]) -> Result<T>,
{
    let snapshots: Vec<PairSnapshot> = guards.iter().map(|guard| guard.snapshot()).collect();
    let checkpoint = ledger.checkpoint();

    match f(ledger, guards) {
        Ok(value) => {
            ledger.commit(checkpoint);
            Ok(value)
        }
        Err(e) => {
            ledger.revert_to(checkpoint);
            for (guard, snapshot) in guards.iter_mut().zip(snapshots) {
                guard.restore(snapshot);
            }
            warn!("{} Router call rolled back: {}", LogEmoji::ERROR, e);
            Err(e)
        }
    }
}

fn hop_reserves(pair: &Pair, input: Address, output: Address) -> Result<(U256, U256)> {
    pair.reserves_for(input).ok_or(AmmError::PairNotFound {
        token_a: input,
        token_b: output,
    })
}

/// `(amount0_out, amount1_out)` for paying `amount_out` of the token
/// opposite to `input`
fn oriented_outputs(pair: &Pair, input: Address, amount_out: U256) -> (U256, U256) {
    if input == pair.token0() {
        (U256::zero(), amount_out)
    } else {
        (amount_out, U256::zero())
    }
}

fn amounts_out(
    guards: &[MutexGuard<'_, Pair>],
    hops: &[usize],
    amount_in: U256,
    path: &[Address],
) -> Result<Vec<U256>> {
    let mut amounts = Vec::with_capacity(path.len());
    amounts.push(amount_in);
    for (i, &slot) in hops.iter().enumerate() {
        let pair = &guards[slot];
        let (reserve_in, reserve_out) = hop_reserves(pair, path[i], path[i + 1])?;
        let amount_out = V2Math::get_amount_out(amounts[i], reserve_in, reserve_out, pair.fee_bps())?;
        amounts.push(amount_out);
    }
    Ok(amounts)
}

fn amounts_in(
    guards: &[MutexGuard<'_, Pair>],
    hops: &[usize],
    amount_out: U256,
    path: &[Address],
) -> Result<Vec<U256>> {
    let mut amounts = vec![U256::zero(); path.len()];
    amounts[path.len() - 1] = amount_out;
    for (i, &slot) in hops.iter().enumerate().rev() {
        let pair = &guards[slot];
        let (reserve_in, reserve_out) = hop_reserves(pair, path[i], path[i + 1])?;
        amounts[i] = V2Math::get_amount_in(amounts[i + 1], reserve_in, reserve_out, pair.fee_bps())?;
    }
    Ok(amounts)
}

/// Execute each hop, sending intermediate outputs straight to the next pair
fn swap_along<L>(
    ledger: &mut L,
    guards: &mut [MutexGuard<'_, Pair>],
    hops: &[usize],
    amounts: &[U256],
    path: &[Address],
    to: Address,
    now: u64,
) -> Result<()>
where
    L: TokenLedger + ?Sized,
{
    for (i, &slot) in hops.iter().enumerate() {
        let recipient = match hops.get(i + 1) {
            Some(&next) => guards[next].address(),
            None => to,
        };
        let pair = &mut guards[slot];
        let (amount0_out, amount1_out) = oriented_outputs(pair, path[i], amounts[i + 1]);
        pair.swap(ledger, amount0_out, amount1_out, recipient, now)?;
    }
    Ok(())
}

/// Amounts to deposit so the pair's ratio is preserved
fn optimal_amounts(
    pair: &Pair,
    token_a: Address,
    amount_a_desired: U256,
    amount_b_desired: U256,
    amount_a_min: U256,
    amount_b_min: U256,
) -> Result<(U256, U256)> {
    let (reserve_a, reserve_b) = pair
        .reserves_for(token_a)
        .unwrap_or((U256::zero(), U256::zero()));

    if reserve_a.is_zero() && reserve_b.is_zero() {
        return Ok((amount_a_desired, amount_b_desired));
    }

    let amount_b_optimal = V2Math::quote(amount_a_desired, reserve_a, reserve_b)?;
    if amount_b_optimal <= amount_b_desired {
        if amount_b_optimal < amount_b_min {
            return Err(AmmError::InsufficientBAmount);
        }
        return Ok((amount_a_desired, amount_b_optimal));
    }

    let amount_a_optimal = V2Math::quote(amount_b_desired, reserve_b, reserve_a)?;
    if amount_a_optimal > amount_a_desired || amount_a_optimal < amount_a_min {
        return Err(AmmError::InsufficientAAmount);
    }
    Ok((amount_a_optimal, amount_b_desired))
}
