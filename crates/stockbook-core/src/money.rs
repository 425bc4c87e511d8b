//! # Money Module
//!
//! Provides the `Money` type and the `Percent` rate type.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Bill totals, supplier balances and ledger rates are stored in the     │
//! │  smallest currency unit (paise / cents) as i64.                        │
//! │                                                                         │
//! │    subtotal   17000   (170.00)                                         │
//! │    discount    1700   (10% of subtotal, rounded half-up)               │
//! │    pre-round  15300                                                    │
//! │    grand      15300   (rounded to a whole currency unit)              │
//! │    round-off      0   (grand - pre-round, may be negative)            │
//! │                                                                         │
//! │  No floating point ever touches a stored amount.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockbook_core::money::{Money, Percent};
//!
//! let subtotal = Money::from_minor(17000);
//! let discount = subtotal.percent(Percent::from_bps(1000));
//! assert_eq!(discount.minor(), 1700);
//!
//! let pre_round = Money::from_minor(15349);
//! assert_eq!(pre_round.round_to_major().minor(), 15300);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Minor units per major currency unit.
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed so that round-off residuals and supplier balance deltas can be
/// expressed without a separate sign flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ```rust
    /// use stockbook_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(50).minor(), 5000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Whole currency units (truncated toward zero).
    #[inline]
    pub const fn major_part(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Fractional part in minor units (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// Callers pass prices and quantities that went through
    /// `validate_price` and `validate_quantity`, which bound the product.
    #[inline]
    pub const fn times(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Money(sum)),
            None => None,
        }
    }

    /// Returns `rate` of this amount, rounded half-up to the minor unit.
    ///
    /// ## Implementation
    /// Integer math on i128: `(amount * bps + 5000) / 10000`. Negative
    /// amounts round half away from zero so `-x.percent(r) == (-x).percent(r)`.
    pub fn percent(&self, rate: Percent) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money(rounded as i64)
    }

    /// Rounds to the nearest whole currency unit, half away from zero.
    ///
    /// ```rust
    /// use stockbook_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(15350).round_to_major().minor(), 15400);
    /// assert_eq!(Money::from_minor(15349).round_to_major().minor(), 15300);
    /// assert_eq!(Money::from_minor(-150).round_to_major().minor(), -200);
    /// ```
    pub fn round_to_major(&self) -> Money {
        let half = MINOR_PER_MAJOR / 2;
        let whole = if self.0 >= 0 {
            (self.0 + half) / MINOR_PER_MAJOR
        } else {
            (self.0 - half) / MINOR_PER_MAJOR
        };
        Money(whole * MINOR_PER_MAJOR)
    }
}

/// Debug-friendly display without a currency symbol (the front-end formats
/// for the shop's locale).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major_part().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A rate in basis points (1 bp = 0.01%).
///
/// Used for bill discounts, bill tax and purchase tax components.
/// 1000 bps = 10%, 250 bps = 2.5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_major() {
        let money = Money::from_minor(1099);
        assert_eq!(money.minor(), 1099);
        assert_eq!(money.major_part(), 10);
        assert_eq!(money.minor_part(), 99);
        assert_eq!(Money::from_major(153).minor(), 15300);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(500).to_string(), "5.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);
        assert_eq!((-a).minor(), -1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        // 10% of 170.00
        assert_eq!(Money::from_minor(17000).percent(Percent::from_bps(1000)).minor(), 1700);
        // 8.25% of 10.00 = 0.825 -> 0.83
        assert_eq!(Money::from_minor(1000).percent(Percent::from_bps(825)).minor(), 83);
        // 5% of 0.10 = 0.005 -> 0.01
        assert_eq!(Money::from_minor(10).percent(Percent::from_bps(500)).minor(), 1);
        assert_eq!(Money::from_minor(-10).percent(Percent::from_bps(500)).minor(), -1);
    }

    #[test]
    fn test_round_to_major() {
        assert_eq!(Money::from_minor(15300).round_to_major().minor(), 15300);
        assert_eq!(Money::from_minor(15349).round_to_major().minor(), 15300);
        assert_eq!(Money::from_minor(15350).round_to_major().minor(), 15400);
        assert_eq!(Money::from_minor(49).round_to_major().minor(), 0);
        assert_eq!(Money::from_minor(-149).round_to_major().minor(), -100);
    }

    #[test]
    fn test_checked_add() {
        let a = Money::from_minor(1000);
        assert_eq!(a.checked_add(Money::from_minor(500)), Some(Money::from_minor(1500)));
        assert_eq!(Money::from_minor(i64::MAX).checked_add(a), None);
    }
}
