//! Checked integer math for pair and router calculations
//!
//! Every helper surfaces overflow, underflow and division by zero as an
//! [`AmmError`] instead of wrapping. Products that can exceed 256 bits go
//! through a 512-bit intermediate.

use crate::error::{AmmError, Result};
use ethers_core::types::{U256, U512};

/// Number of fractional bits in a UQ112x112 price
pub const RESOLUTION: usize = 112;

/// Largest value a reserve may hold (`2^112 - 1`)
pub fn max_reserve() -> U256 {
    (U256::one() << dex_config::defaults::RESERVE_BITS) - 1
}

pub fn checked_add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(AmmError::ArithmeticOverflow)
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(AmmError::ArithmeticUnderflow)
}

pub fn checked_mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(AmmError::ArithmeticOverflow)
}

pub fn checked_div(a: U256, b: U256) -> Result<U256> {
    a.checked_div(b).ok_or(AmmError::DivisionByZero)
}

/// Smaller of two values
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

/// `floor(a * b / denominator)` with a 512-bit intermediate product
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(AmmError::DivisionByZero);
    }

    let quotient = a.full_mul(b) / U512::from(denominator);
    U256::try_from(quotient).map_err(|_| AmmError::ArithmeticOverflow)
}

/// Integer square root, `floor(sqrt(y))`, by Babylonian iteration
///
/// Deterministic: the iteration sequence depends only on `y`.
pub fn sqrt(y: U256) -> Result<U256> {
    if y > U256::from(3u8) {
        let mut z = y;
        let mut x = y / 2 + 1;
        while x < z {
            z = x;
            x = checked_add(y / x, x)? / 2;
        }
        Ok(z)
    } else if !y.is_zero() {
        Ok(U256::one())
    } else {
        Ok(U256::zero())
    }
}

/// Encode an integer as a UQ112x112 fixed-point value
pub fn encode_uq112x112(y: U256) -> Result<U256> {
    if y > max_reserve() {
        return Err(AmmError::ArithmeticOverflow);
    }
    Ok(y << RESOLUTION)
}

/// Divide a UQ112x112 value by an integer
pub fn uq_div(x: U256, y: U256) -> Result<U256> {
    checked_div(x, y)
}
