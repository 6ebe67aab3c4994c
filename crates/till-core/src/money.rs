//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    4980 × 0.19 = 946.1999999999999  ❌                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + basis-point rates                  │
//! │    (4980 × 1900 + 5000) / 10000 = 946   ✅ exact, HALF_UP               │
//! │                                                                         │
//! │  The register currency (CLP) has no decimals, so one unit = one peso.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let price = Money::from_units(2490);
//! let line = price.checked_mul_quantity(2).unwrap();
//! assert_eq!(line.units(), 4980);
//! assert_eq!(line.to_string(), "$4.980");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: differences such as cash variance can be negative
/// - **Single field tuple struct**: zero-cost, serializes as a plain number
///
/// ## Where Money Flows
/// ```text
/// Product.unit_price ──► line total (× qty) ──► subtotal
///                                                  │
///                                       tax (HALF_UP, bps)
///                                                  │
///                                                  ▼
///                                   total ──► tenders {cash, card, transfer}
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from the smallest currency unit.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in the smallest currency unit.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
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

    /// Calculates tax rounded HALF_UP (ties away from zero).
    ///
    /// ## Implementation
    /// Integer math on the magnitude: `(|amount| * bps + 5000) / 10000`,
    /// then the sign is restored. The +5000 is the half of 10000.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_units(4980);
    /// assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(1900)).units(), 946);
    ///
    /// // 50 × 19% = 9.5 → 10
    /// assert_eq!(Money::from_units(50).calculate_tax(TaxRate::from_bps(1900)).units(), 10);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large subtotals cannot overflow the intermediate product
        let magnitude = (self.0 as i128).abs();
        let tax = (magnitude * rate.bps() as i128 + 5000) / 10000;
        let tax = if self.0 < 0 { -tax } else { tax };
        Money(tax as i64)
    }

    /// Multiplies a unit price by a quantity, `None` on overflow.
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `$1.234.567` (dot grouping, no decimals).
///
/// For logs and receipts; the UI formats from the raw units.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}", sign, grouped)
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
