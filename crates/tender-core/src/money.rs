//! # Money Module
//!
//! Fixed-point money types used by every allocation and tax step.
//!
//! ## Two Scales, One Rounding Mode
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Money        scale 2   integer cents (i64)   display + ledger fields   │
//! │  UnitAmount   scale 4   rust_decimal          per-unit tax basis        │
//! │                                                                         │
//! │  Every operation that can produce a sub-cent result rounds             │
//! │  IMMEDIATELY, HALF_UP (midpoint away from zero):                       │
//! │                                                                         │
//! │    0.29355 → 0.29        0.245 → 0.25        0.2449 → 0.24              │
//! │                                                                         │
//! │  Nothing is ever "rounded later" by a caller.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal_macros::dec;
//! use tender_core::money::{Money, UnitAmount};
//!
//! let price = Money::from_cents(299); // $2.99
//! let line = price * 3i64;            // $8.97
//! assert_eq!(line.cents(), 897);
//!
//! // Sub-cent values round half-up the moment they become Money
//! assert_eq!(Money::from_decimal(dec!(0.245)).cents(), 25);
//!
//! // Per-unit intermediates keep four places
//! let basis = UnitAmount::per_unit(Money::from_cents(1000), 3);
//! assert_eq!(basis.as_decimal(), dec!(3.3333));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// The single rounding mode of the engine (HALF_UP).
pub const HALF_UP: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  LineItem.unit_price ──► gross_extended_price ──► Totals.subtotal       │
/// │                                                                         │
/// │  PaymentRequest.amount ──► allocator ──► LineItem.snap_paid_amount ...  │
/// │                                                                         │
/// │  TaxEngine ──► LineItem.tax_per_unit ──► LineItem.tax_total             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tender_core::money::Money;
    ///
    /// let price = Money::from_cents(429); // $4.29
    /// assert_eq!(price.cents(), 429);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount to cents, rounding HALF_UP to two places.
    ///
    /// This is the only way a sub-cent value becomes `Money`.
    pub fn from_decimal(value: Decimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(2, HALF_UP);
        rounded.rescale(2);
        Money(rounded.mantissa() as i64)
    }

    /// Returns the value as an exact two-place decimal.
    #[inline]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
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

    /// Multiplies money by a quantity. Exact, no rounding involved.
    ///
    /// ## Example
    /// ```rust
    /// use tender_core::money::Money;
    ///
    /// let tax_per_unit = Money::from_cents(29);
    /// assert_eq!(tax_per_unit.multiply_quantity(3).cents(), 87);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Subtracts without going below zero.
    #[inline]
    pub fn saturating_sub(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Number of whole `unit`s needed to cover this amount (ceiling division).
    ///
    /// A partially covered unit counts as one. Returns 0 for a non-positive
    /// amount or unit.
    ///
    /// ```rust
    /// use tender_core::money::Money;
    ///
    /// let milk = Money::from_cents(429);
    /// assert_eq!(Money::from_cents(429).units_of(milk), 1);
    /// assert_eq!(Money::from_cents(430).units_of(milk), 2);
    /// assert_eq!(Money::zero().units_of(milk), 0);
    /// ```
    pub fn units_of(self, unit: Money) -> i64 {
        if self.0 <= 0 || unit.0 <= 0 {
            return 0;
        }
        (self.0 + unit.0 - 1) / unit.0
    }
}

// =============================================================================
// UnitAmount (scale 4)
// =============================================================================

/// A per-unit intermediate amount carried at four decimal places.
///
/// Used for the taxable basis of a single unit when only part of a
/// multi-unit line is taxable (e.g. $1.00 taxable over 3 units = $0.3333).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitAmount(Decimal);

impl UnitAmount {
    /// Decimal places kept by a `UnitAmount`.
    pub const SCALE: u32 = 4;

    /// Rounds an arbitrary decimal HALF_UP to four places.
    pub fn from_decimal(value: Decimal) -> Self {
        UnitAmount(value.round_dp_with_strategy(Self::SCALE, HALF_UP))
    }

    /// Splits a total evenly across `quantity` units, rounding HALF_UP.
    ///
    /// A non-positive quantity yields zero.
    pub fn per_unit(total: Money, quantity: i64) -> Self {
        if quantity <= 0 {
            return UnitAmount(Decimal::ZERO);
        }
        Self::from_decimal(total.to_decimal() / Decimal::from(quantity))
    }

    /// Returns the underlying decimal.
    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Checks if the amount is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<Money> for UnitAmount {
    fn from(value: Money) -> Self {
        UnitAmount(value.to_decimal())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-style display ("$10.99", "-$5.50").
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl fmt::Display for UnitAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
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

/// Multiplication by quantity.
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
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
