//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A credit ledger that drifts by one paisa per entry never balances.    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paisa (1 rupee = 100 paisa)                     │
//! │    Rs. 10.00 / 3 = 333 paisa (×3 = 999 paisa)                          │
//! │    We KNOW we lost 1 paisa, and handle it explicitly                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kirana_core::money::Money;
//!
//! let price = Money::from_paisa(1099); // Rs. 10.99
//! let doubled = price * 2;             // Rs. 21.98
//! assert_eq!(doubled.paisa(), 2198);
//!
//! // Form input arrives as decimal rupees
//! let paid: Money = "150.5".parse().unwrap();
//! assert_eq!(paid.paisa(), 15050);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in paisa (1/100 of a rupee).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and ledger deltas
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serialized as an integer**: JSON carries paisa, never floats
///
/// ## Where Money is Used
/// ```text
/// Product.selling_price ──► SaleItem.unit_price ──► SaleItem.line_total
///                                                        │
///                      Sale.subtotal ◄───────────────────┘
///                           │
///                 discount ─┼─ VAT ──► Sale.total ──► paid / due
///                           │
///                 Customer.current_credit ◄── due (credit ledger)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paisa (the smallest currency unit).
    #[inline]
    pub const fn from_paisa(paisa: i64) -> Self {
        Money(paisa)
    }

    /// Creates a Money value from rupees and paisa.
    ///
    /// ## Note
    /// For negative amounts, only the rupee part should be negative.
    /// `from_rupees_paisa(-5, 50)` = -Rs. 5.50
    #[inline]
    pub const fn from_rupees_paisa(rupees: i64, paisa: i64) -> Self {
        if rupees < 0 {
            Money(rupees * 100 - paisa)
        } else {
            Money(rupees * 100 + paisa)
        }
    }

    /// Returns the value in paisa.
    #[inline]
    pub const fn paisa(&self) -> i64 {
        self.0
    }

    /// Returns the whole rupee portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paisa portion (always 0-99).
    #[inline]
    pub const fn paisa_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// ## Example
    /// ```rust
    /// use kirana_core::money::Money;
    ///
    /// // Change due when the customer under-pays is zero, not negative
    /// assert_eq!(Money::from_paisa(-250).non_negative(), Money::zero());
    /// ```
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Calculates tax with half-up rounding to the nearest paisa.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5).
    ///
    /// ## Example
    /// ```rust
    /// use kirana_core::money::Money;
    /// use kirana_core::types::TaxRate;
    ///
    /// let taxable = Money::from_paisa(9_000); // Rs. 90.00
    /// let vat = taxable.calculate_tax(TaxRate::from_bps(1300));
    /// assert_eq!(vat.paisa(), 1_170); // Rs. 11.70
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money::from_paisa(self.portion_bps(rate.bps()))
    }

    /// Multiplies money by a quantity, `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(paisa) => Some(Money(paisa)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(paisa) => Some(Money(paisa)),
            None => None,
        }
    }

    /// Returns the discount amount for a percentage given in basis points.
    ///
    /// ## Example
    /// ```rust
    /// use kirana_core::money::Money;
    ///
    /// let subtotal = Money::from_paisa(10_000);
    /// assert_eq!(subtotal.percentage_amount(1_000).paisa(), 1_000); // 10%
    /// ```
    pub fn percentage_amount(&self, bps: u32) -> Money {
        Money::from_paisa(self.portion_bps(bps))
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        Money::from_paisa(self.0 - self.portion_bps(discount_bps))
    }

    // Use i128 to prevent overflow on large amounts
    fn portion_bps(&self, bps: u32) -> i64 {
        ((self.0 as i128 * bps as i128 + 5000) / 10000) as i64
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Error returned when a decimal rupee string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: '{0}'")]
pub struct ParseMoneyError(pub String);

/// Parses decimal rupee strings such as `"150"`, `"150.5"` or `"-12.05"`.
///
/// More than two fractional digits are rejected rather than rounded.
impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return Err(invalid());
        }

        let rupees: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let paisa: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        let total = rupees
            .checked_mul(100)
            .and_then(|r| r.checked_add(paisa))
            .ok_or_else(invalid)?;
        Ok(Money(if negative { -total } else { total }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `Rs. 1234.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}Rs. {}.{:02}",
            sign,
            self.rupees().abs(),
            self.paisa_part()
        )
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
// Unit Tests
// =============================================================================
