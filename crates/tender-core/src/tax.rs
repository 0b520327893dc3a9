//! # Tax Engine
//!
//! Pure tax math. This module is the only place a tax amount is rounded.
//!
//! ## The Tax Consistency Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Round PER UNIT, then multiply by quantity. Never the other way round. │
//! │                                                                         │
//! │  Price $2.99 + $0.10 CRV at 9.5%                                        │
//! │                                                                         │
//! │    tax_per_unit = round(3.09 × 0.095, 2) = round(0.29355) = $0.29      │
//! │                                                                         │
//! │    qty 3 on one line   → 0.29 × 3           = $0.87                     │
//! │    3 lines of qty 1    → 0.29 + 0.29 + 0.29 = $0.87   ✓ same            │
//! │                                                                         │
//! │    (rounding the line instead: round(9.27 × 0.095) = round(0.88065)     │
//! │     = $0.88 ✗ splitting the sale would change the tax collected)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The taxable basis always includes CRV and excludes only what a
//! tax-exempt tender (SNAP, WIC) currently covers.

use rust_decimal::Decimal;

use crate::money::{Money, UnitAmount};
use crate::types::TaxRate;

/// Tax for one line: the rounded per-unit figure and its exact product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTax {
    pub per_unit: Money,
    pub total: Money,
}

impl LineTax {
    /// No tax.
    pub const fn zero() -> Self {
        LineTax {
            per_unit: Money::zero(),
            total: Money::zero(),
        }
    }
}

/// Rounded tax on one unit: `round(basis × rate / 100, 2, HALF_UP)`.
///
/// ## Example
/// ```rust
/// use rust_decimal_macros::dec;
/// use tender_core::money::{Money, UnitAmount};
/// use tender_core::tax::tax_per_unit;
/// use tender_core::TaxRate;
///
/// let basis = UnitAmount::from(Money::from_cents(309));
/// let tax = tax_per_unit(basis, TaxRate::from_percent(dec!(9.5)));
/// assert_eq!(tax.cents(), 29);
/// ```
pub fn tax_per_unit(basis_per_unit: UnitAmount, rate: TaxRate) -> Money {
    if basis_per_unit.is_zero() || rate.is_zero() {
        return Money::zero();
    }
    Money::from_decimal(basis_per_unit.as_decimal() * rate.percent() / Decimal::ONE_HUNDRED)
}

/// Line tax: `tax_per_unit × quantity`, with no further rounding.
#[inline]
pub fn line_tax(tax_per_unit: Money, quantity: i64) -> Money {
    tax_per_unit.multiply_quantity(quantity)
}

/// Tax on `taxable` spread evenly over `quantity` units.
///
/// The per-unit basis is carried at four places before the per-unit tax is
/// rounded, so a fully taxable line reduces to `tax_per_unit(net price + crv)`.
pub fn tax_for_taxable_amount(taxable: Money, quantity: i64, rate: TaxRate) -> LineTax {
    if !taxable.is_positive() || quantity <= 0 {
        return LineTax::zero();
    }
    let basis = UnitAmount::per_unit(taxable, quantity);
    let per_unit = tax_per_unit(basis, rate);
    LineTax {
        per_unit,
        total: line_tax(per_unit, quantity),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rate(pct: Decimal) -> TaxRate {
        TaxRate::from_percent(pct)
    }

    #[test]
    fn test_tax_per_unit_rounds_half_up() {
        // 3.09 × 9.5% = 0.29355
        let tax = tax_per_unit(Money::from_cents(309).into(), rate(dec!(9.5)));
        assert_eq!(tax.cents(), 29);

        // 2.59 × 9.5% = 0.24605
        let tax = tax_per_unit(Money::from_cents(259).into(), rate(dec!(9.5)));
        assert_eq!(tax.cents(), 25);

        // 1.00 × 2.5% = 0.025 → 0.03 (midpoint goes up)
        let tax = tax_per_unit(Money::from_cents(100).into(), rate(dec!(2.5)));
        assert_eq!(tax.cents(), 3);
    }

    #[test]
    fn test_line_tax_multiplies_rounded_unit_tax() {
        let per_unit = tax_per_unit(Money::from_cents(309).into(), rate(dec!(9.5)));
        assert_eq!(line_tax(per_unit, 3).cents(), 87);
    }

    #[test]
    fn test_split_sale_collects_same_tax() {
        let combined = tax_for_taxable_amount(Money::from_cents(927), 3, rate(dec!(9.5)));
        let single = tax_for_taxable_amount(Money::from_cents(309), 1, rate(dec!(9.5)));

        assert_eq!(combined.per_unit, single.per_unit);
        assert_eq!(combined.total, single.total * 3i64);
        assert_eq!(combined.total.cents(), 87);
    }

    #[test]
    fn test_scenario_taxes() {
        let r = rate(dec!(9.5));
        assert_eq!(tax_for_taxable_amount(Money::from_cents(399), 1, r).total.cents(), 38);
        assert_eq!(tax_for_taxable_amount(Money::from_cents(269), 1, r).total.cents(), 26);
        assert_eq!(tax_for_taxable_amount(Money::from_cents(599), 1, r).total.cents(), 57);
    }

    #[test]
    fn test_partial_basis_uses_four_place_unit_amount() {
        // $1.00 taxable over 3 units → basis 0.3333, 0.3333 × 9.5% = 0.03166 → 0.03
        let tax = tax_for_taxable_amount(Money::from_cents(100), 3, rate(dec!(9.5)));
        assert_eq!(tax.per_unit.cents(), 3);
        assert_eq!(tax.total.cents(), 9);
    }

    #[test]
    fn test_zero_cases() {
        assert_eq!(
            tax_for_taxable_amount(Money::zero(), 2, rate(dec!(9.5))),
            LineTax::zero()
        );
        assert_eq!(
            tax_for_taxable_amount(Money::from_cents(500), 2, TaxRate::zero()),
            LineTax::zero()
        );
        assert_eq!(
            tax_for_taxable_amount(Money::from_cents(-5), 1, rate(dec!(9.5))),
            LineTax::zero()
        );
    }
}
