//! # Tax Recalculator
//!
//! Re-derives a line's taxable basis and tax from its benefit-paid amounts.
//!
//! ## Recalculation Flow
//! ```text
//! snap_paid + wic_paid changed
//!        │
//!        ▼
//! exempt   = min(gross, snap_paid + wic_paid)
//! taxable  = gross - exempt          (= gross × (1 - exempt / gross))
//!        │
//!        ▼
//! tax::tax_for_taxable_amount(taxable, quantity, line.tax_rate)
//!        │
//!        ▼
//! subject_to_tax_total, tax_per_unit, tax_total   (overwritten, never scaled)
//! ```
//!
//! The previous `tax_total` is never an input. Recomputing from the line's
//! own rate and current paid amounts means the same paid amounts always give
//! the same tax, whatever path led to them.

use rust_decimal::Decimal;

use crate::money::Money;
use crate::tax;
use crate::types::LineItem;

/// Returns a copy of `line` with its tax fields re-derived.
pub fn recalculate_line(line: &LineItem) -> LineItem {
    let taxable = taxable_amount(line);
    let line_tax = tax::tax_for_taxable_amount(taxable, line.quantity, line.tax_rate);

    let mut updated = line.clone();
    updated.subject_to_tax_total = taxable.max(Money::zero());
    updated.tax_per_unit = line_tax.per_unit;
    updated.tax_total = line_tax.total;
    updated
}

/// Re-derives every line.
pub fn recalculate_all(lines: &[LineItem]) -> Vec<LineItem> {
    lines.iter().map(recalculate_line).collect()
}

/// Gross still subject to tax: `gross - min(gross, snap + wic)`.
pub fn taxable_amount(line: &LineItem) -> Money {
    let gross = line.gross_extended_price();
    let exempt = line.benefit_paid().min(gross);
    gross - exempt
}

/// Share of the line covered by tax-exempt tenders, clamped to `[0, 1]`.
///
/// A zero-value line reports 0.
pub fn exempt_fraction(line: &LineItem) -> Decimal {
    let gross = line.gross_extended_price();
    if !gross.is_positive() {
        return Decimal::ZERO;
    }
    let fraction = line.benefit_paid().to_decimal() / gross.to_decimal();
    fraction.min(Decimal::ONE).max(Decimal::ZERO)
}

/// `1 - exempt_fraction`.
pub fn taxable_fraction(line: &LineItem) -> Decimal {
    Decimal::ONE - exempt_fraction(line)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxRate;
    use rust_decimal_macros::dec;

    fn soda() -> LineItem {
        LineItem::new("soda", "Soda", 1, Money::from_cents(259))
            .with_tax_rate(TaxRate::from_percent(dec!(9.5)))
            .snap_eligible()
    }

    #[test]
    fn test_unpaid_line_is_fully_taxable() {
        let line = recalculate_line(&soda());
        assert_eq!(line.subject_to_tax_total.cents(), 259);
        assert_eq!(line.tax_total.cents(), 25);
        assert_eq!(taxable_fraction(&line), Decimal::ONE);
    }

    #[test]
    fn test_fully_snap_paid_line_has_no_tax() {
        let mut line = soda();
        line.snap_paid_amount = Money::from_cents(259);
        let line = recalculate_line(&line);

        assert_eq!(line.subject_to_tax_total, Money::zero());
        assert_eq!(line.tax_per_unit, Money::zero());
        assert_eq!(line.tax_total, Money::zero());
        assert_eq!(exempt_fraction(&line), Decimal::ONE);
    }

    #[test]
    fn test_partial_snap_payment_taxes_remainder() {
        let mut line = soda();
        line.snap_paid_amount = Money::from_cents(100);
        let line = recalculate_line(&line);

        // 1.59 × 9.5% = 0.15105
        assert_eq!(line.subject_to_tax_total.cents(), 159);
        assert_eq!(line.tax_total.cents(), 15);
    }

    #[test]
    fn test_non_benefit_payment_does_not_change_tax() {
        let mut line = soda();
        line.non_benefit_paid_amount = Money::from_cents(259);
        let line = recalculate_line(&line);
        assert_eq!(line.tax_total.cents(), 25);
    }

    #[test]
    fn test_crv_stays_in_taxable_basis() {
        let mut line = LineItem::new("w", "Water", 3, Money::from_cents(299))
            .with_crv(Money::from_cents(10))
            .with_tax_rate(TaxRate::from_percent(dec!(9.5)));
        assert_eq!(line.tax_total.cents(), 87);

        // Benefit covers one unit's worth: 6.18 left over 3 units = 2.06/unit
        line.snap_paid_amount = Money::from_cents(309);
        let line = recalculate_line(&line);
        assert_eq!(line.subject_to_tax_total.cents(), 618);
        // 2.06 × 9.5% = 0.1957 → 0.20 per unit
        assert_eq!(line.tax_per_unit.cents(), 20);
        assert_eq!(line.tax_total.cents(), 60);
    }

    #[test]
    fn test_recalculation_is_path_independent() {
        let mut a = soda();
        a.snap_paid_amount = Money::from_cents(100);
        let a = recalculate_line(&a);
        let mut a2 = a.clone();
        a2.snap_paid_amount = Money::from_cents(150);
        let a2 = recalculate_line(&a2);

        let mut b = soda();
        b.snap_paid_amount = Money::from_cents(150);
        let b = recalculate_line(&b);

        assert_eq!(a2, b);
    }
}
