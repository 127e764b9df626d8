//! Token collaborator contract and an in-memory ledger
//!
//! Pairs and the router only need `transfer`, `transfer_from` and
//! `balance_of` from a token. The ledger also exposes checkpoints so a
//! failed operation can undo every transfer it made.

use crate::error::{AmmError, Result};
use dex_config::defaults::BPS_DENOMINATOR;
use ethers_core::types::{Address, U256};
use std::collections::HashMap;
use tracing::trace;

/// Position in a ledger's write journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a checkpoint must be committed or reverted"]
pub struct Checkpoint {
    journal_len: usize,
}

/// Balance ledger for any number of fungible tokens
///
/// Transfers report failure with `false` (insufficient balance or
/// allowance) and leave state untouched in that case. Checkpoints nest;
/// every `checkpoint` must be closed by exactly one `commit` or
/// `revert_to`, innermost first.
pub trait TokenLedger {
    /// Balance of `holder` in `token`
    fn balance_of(&self, token: Address, holder: Address) -> U256;

    /// Move `amount` of `token` from `from` to `to`
    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> bool;

    /// Move `amount` of `token` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> bool;

    /// Open a checkpoint
    fn checkpoint(&mut self) -> Checkpoint;

    /// Keep every write made since `checkpoint`
    fn commit(&mut self, checkpoint: Checkpoint);

    /// Undo every write made since `checkpoint`
    fn revert_to(&mut self, checkpoint: Checkpoint);
}

/// Run `f` inside a checkpoint, reverting the ledger if it fails
pub fn atomic<L, T, F>(ledger: &mut L, f: F) -> Result<T>
where
    L: TokenLedger + ?Sized,
    F: FnOnce(&mut L) -> Result<T>,
{
    let checkpoint = ledger.checkpoint();
    match f(ledger) {
        Ok(value) => {
            ledger.commit(checkpoint);
            Ok(value)
        }
        Err(e) => {
            ledger.revert_to(checkpoint);
            Err(e)
        }
    }
}

/// `ledger.transfer` that turns a refusal into [`AmmError::TransferFailed`]
pub fn safe_transfer<L: TokenLedger + ?Sized>(
    ledger: &mut L,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<()> {
    if ledger.transfer(token, from, to, amount) {
        Ok(())
    } else {
        Err(AmmError::TransferFailed {
            token,
            from,
            to,
            amount,
        })
    }
}

/// `ledger.transfer_from` that turns a refusal into [`AmmError::TransferFailed`]
pub fn safe_transfer_from<L: TokenLedger + ?Sized>(
    ledger: &mut L,
    token: Address,
    spender: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<()> {
    if ledger.transfer_from(token, spender, from, to, amount) {
        Ok(())
    } else {
        Err(AmmError::TransferFailed {
            token,
            from,
            to,
            amount,
        })
    }
}

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        token: Address,
        holder: Address,
        previous: U256,
    },
    Allowance {
        token: Address,
        owner: Address,
        spender: Address,
        previous: U256,
    },
    Supply {
        token: Address,
        previous: U256,
    },
}

/// In-memory [`TokenLedger`] with optional fee-on-transfer tokens
///
/// A token configured with a transfer fee burns `amount * fee_bps / 10_000`
/// of every transfer, so recipients observe less than was sent.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    supplies: HashMap<Address, U256>,
    transfer_fees: HashMap<Address, u32>,
    journal: Vec<JournalEntry>,
    depth: usize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `token` for `to`
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        let supply = self.total_supply(token);
        let new_supply = supply
            .checked_add(amount)
            .ok_or(AmmError::ArithmeticOverflow)?;
        let new_balance = self.balance(token, to) + amount;

        self.set_supply(token, new_supply);
        self.set_balance(token, to, new_balance);
        Ok(())
    }

    /// Allow `spender` to move up to `amount` of `owner`'s `token`
    ///
    /// `U256::MAX` is an infinite allowance that transfers never decrease.
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.set_allowance(token, owner, spender, amount);
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.supplies.get(&token).copied().unwrap_or_default()
    }

    /// Turn `token` into a fee-on-transfer token
    pub fn set_transfer_fee_bps(&mut self, token: Address, fee_bps: u32) {
        self.transfer_fees.insert(token, fee_bps.min(BPS_DENOMINATOR));
    }

    fn balance(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, token: Address, holder: Address, amount: U256) {
        let previous = self.balance(token, holder);
        if self.depth > 0 {
            self.journal.push(JournalEntry::Balance {
                token,
                holder,
                previous,
            });
        }
        self.balances.insert((token, holder), amount);
    }

    fn set_allowance(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        let previous = self.allowance(token, owner, spender);
        if self.depth > 0 {
            self.journal.push(JournalEntry::Allowance {
                token,
                owner,
                spender,
                previous,
            });
        }
        self.allowances.insert((token, owner, spender), amount);
    }

    fn set_supply(&mut self, token: Address, amount: U256) {
        let previous = self.total_supply(token);
        if self.depth > 0 {
            self.journal.push(JournalEntry::Supply { token, previous });
        }
        self.supplies.insert(token, amount);
    }

    fn transfer_fee(&self, token: Address, amount: U256) -> U256 {
        match self.transfer_fees.get(&token) {
            Some(&fee_bps) if fee_bps > 0 => {
                amount * U256::from(fee_bps) / U256::from(BPS_DENOMINATOR)
            }
            _ => U256::zero(),
        }
    }
}

impl TokenLedger for MemoryLedger {
    fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balance(token, holder)
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> bool {
        let from_balance = self.balance(token, from);
        if from_balance < amount {
            trace!(?token, ?from, %amount, %from_balance, "transfer refused");
            return false;
        }
        if amount.is_zero() || from == to {
            return true;
        }

        let fee = self.transfer_fee(token, amount);
        let received = amount - fee;

        self.set_balance(token, from, from_balance - amount);
        let to_balance = self.balance(token, to);
        self.set_balance(token, to, to_balance + received);
        if !fee.is_zero() {
            let supply = self.total_supply(token);
            self.set_supply(token, supply - fee);
        }
        true
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> bool {
        let allowance = self.allowance(token, from, spender);
        if spender != from && allowance < amount {
            trace!(?token, ?spender, ?from, %amount, %allowance, "allowance refused");
            return false;
        }
        if !self.transfer(token, from, to, amount) {
            return false;
        }
        if spender != from && allowance != U256::MAX {
            self.set_allowance(token, from, spender, allowance - amount);
        }
        true
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint {
            journal_len: self.journal.len(),
        }
    }

    fn commit(&mut self, _checkpoint: Checkpoint) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.journal_len {
            match self.journal.pop() {
                Some(JournalEntry::Balance {
                    token,
                    holder,
                    previous,
                }) => {
                    self.balances.insert((token, holder), previous);
                }
                Some(JournalEntry::Allowance {
                    token,
                    owner,
                    spender,
                    previous,
                }) => {
                    self.allowances.insert((token, owner, spender), previous);
                }
                Some(JournalEntry::Supply { token, previous }) => {
                    self.supplies.insert(token, previous);
                }
                None => break,
            }
        }
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.journal.clear();
        }
    }
}
