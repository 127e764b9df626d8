//! Constant-product quoting math
//!
//! Integer formulas shared by the router and by anyone pricing a trade
//! off-line. They mirror the fee-adjusted check the pair enforces, so a
//! quoted output is always accepted by the pair for the same reserves.

use crate::error::{AmmError, Result};
use crate::math::{checked_add, checked_div, checked_mul, checked_sub, mul_div};
use dex_config::defaults::BPS_DENOMINATOR;
use ethers_core::types::{Address, U256};

/// Constant-product math functions with floor rounding in favour of the pool
pub struct V2Math;

impl V2Math {
    /// Order two distinct tokens canonically (ascending address)
    pub fn sort_tokens(token_a: Address, token_b: Address) -> Result<(Address, Address)> {
        if token_a == token_b {
            return Err(AmmError::IdenticalTokens(token_a));
        }
        let (token0, token1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        if token0.is_zero() {
            return Err(AmmError::ZeroToken);
        }
        Ok((token0, token1))
    }

    /// Equivalent amount of the other asset at the current reserve ratio
    ///
    /// `amount_a * reserve_b / reserve_a`, no fee applied.
    pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256> {
        if amount_a.is_zero() {
            return Err(AmmError::InsufficientAAmount);
        }
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }
        mul_div(amount_a, reserve_b, reserve_a)
    }

    /// Calculate exact output amount for a given input using x*y=k
    ///
    /// # Arguments
    /// * `amount_in` - Input token amount
    /// * `reserve_in` - Input token reserve
    /// * `reserve_out` - Output token reserve
    /// * `fee_bps` - Fee in basis points (30 = 0.3%)
    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> Result<U256> {
        if amount_in.is_zero() {
            return Err(AmmError::InsufficientInputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }

        // amount_in_with_fee = amount_in * (10000 - fee_bps)
        let amount_in_with_fee = checked_mul(amount_in, fee_complement(fee_bps)?)?;
        let denominator = checked_add(
            checked_mul(reserve_in, U256::from(BPS_DENOMINATOR))?,
            amount_in_with_fee,
        )?;

        mul_div(amount_in_with_fee, reserve_out, denominator)
    }

    /// Calculate required input amount for a desired output (reverse calculation)
    ///
    /// Rounds up by one unit so the returned input always covers `amount_out`.
    pub fn get_amount_in(
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> Result<U256> {
        if amount_out.is_zero() {
            return Err(AmmError::InsufficientOutputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() || amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity);
        }

        let numerator = checked_mul(
            checked_mul(reserve_in, amount_out)?,
            U256::from(BPS_DENOMINATOR),
        )?;
        let denominator = checked_mul(
            checked_sub(reserve_out, amount_out)?,
            fee_complement(fee_bps)?,
        )?;

        checked_add(checked_div(numerator, denominator)?, U256::one())
    }
}

fn fee_complement(fee_bps: u32) -> Result<U256> {
    BPS_DENOMINATOR
        .checked_sub(fee_bps)
        .map(U256::from)
        .ok_or(AmmError::ArithmeticUnderflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_v2_output_calculation() {
        // 100 tokens in, 1000:1000 reserves, 0.3% fee
        let output = V2Math::get_amount_out(u(100), u(1000), u(1000), 30).unwrap();
        let expected = (100 * 997 * 1000) / (1000 * 1000 + 100 * 997);
        assert_eq!(output, u(expected));
        assert_eq!(output, u(90));
    }

    #[test]
    fn test_v2_output_matches_per_mille_formula() {
        // 30 bps over 10_000 is the same ratio as 3 over 1_000
        let output = V2Math::get_amount_out(u(100), u(1000), u(2000), 30).unwrap();
        assert_eq!(output, u((100 * 997 * 2000) / (1000 * 1000 + 100 * 997)));
    }

    #[test]
    fn test_input_validation() {
        assert_eq!(
            V2Math::get_amount_out(u(0), u(1), u(1), 30),
            Err(AmmError::InsufficientInputAmount)
        );
        assert_eq!(
            V2Math::get_amount_out(u(1), u(0), u(1), 30),
            Err(AmmError::InsufficientLiquidity)
        );
        assert_eq!(
            V2Math::get_amount_in(u(0), u(1), u(1), 30),
            Err(AmmError::InsufficientOutputAmount)
        );
        assert_eq!(
            V2Math::get_amount_in(u(1000), u(1000), u(1000), 30),
            Err(AmmError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_amount_in_covers_output() {
        let amount_in = V2Math::get_amount_in(u(90), u(1000), u(1000), 30).unwrap();
        let out = V2Math::get_amount_out(amount_in, u(1000), u(1000), 30).unwrap();
        assert!(out >= u(90));

        let less = V2Math::get_amount_out(amount_in - 1, u(1000), u(1000), 30).unwrap();
        assert!(less <= u(90));
    }

    #[test]
    fn test_quote_is_proportional() {
        assert_eq!(V2Math::quote(u(10), u(100), u(250)).unwrap(), u(25));
        assert_eq!(
            V2Math::quote(u(0), u(100), u(250)),
            Err(AmmError::InsufficientAAmount)
        );
    }

    #[test]
    fn test_sort_tokens() {
        let a = Address::from_low_u64_be(2);
        let b = Address::from_low_u64_be(1);
        assert_eq!(V2Math::sort_tokens(a, b).unwrap(), (b, a));
        assert_eq!(V2Math::sort_tokens(b, a).unwrap(), (b, a));
        assert_eq!(V2Math::sort_tokens(a, a), Err(AmmError::IdenticalTokens(a)));
        assert_eq!(
            V2Math::sort_tokens(Address::zero(), a),
            Err(AmmError::ZeroToken)
        );
    }
}
