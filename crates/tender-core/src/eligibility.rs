//! # Eligibility Calculator
//!
//! Computes, once per transaction and before any tender, how much of each
//! line WIC and SNAP may pay and whether SNAP payment removes tax.
//!
//! ## Per-Line Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  wic_eligible_amount                                                    │
//! │    0 unless is_wic_approved AND a prescription for wic_category        │
//! │    accepts the line (brand, size, units left). Then                    │
//! │      units  = min(units left on prescription, quantity)                │
//! │      amount = min(units × unit_price, gross_extended_price)            │
//! │    Units are taken from the prescription in line order, so two lines   │
//! │    of one category never both claim the same remaining units.          │
//! │                                                                         │
//! │  snap_eligible_amount = gross_extended_price if is_snap_eligible else 0 │
//! │                                                                         │
//! │  is_snap_taxable      = tax rate > 0                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The result is frozen for the payment phase; the orchestrator refuses to
//! recompute it once a tender has been accepted.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocation::wic;
use crate::error::WicRejection;
use crate::money::Money;
use crate::types::{LineItem, WicPrescription};

// =============================================================================
// Eligibility Types
// =============================================================================

/// Frozen eligibility of one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEligibility {
    pub line_id: String,

    /// Most WIC may ever pay on this line.
    pub wic_eligible_amount: Money,

    /// Prescription units behind `wic_eligible_amount`.
    pub wic_eligible_units: i64,

    /// Most SNAP may ever pay on this line.
    pub snap_eligible_amount: Money,

    /// SNAP payment on this line removes tax.
    pub is_snap_taxable: bool,

    /// Why a WIC-approved line got no WIC eligibility, if it didn't.
    pub wic_rejection: Option<WicRejection>,
}

/// Eligibility for every line, in line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEligibility {
    lines: Vec<LineEligibility>,
}

impl TransactionEligibility {
    /// Eligibility entries in line order.
    pub fn lines(&self) -> &[LineEligibility] {
        &self.lines
    }

    /// Entry for the line at `index`.
    pub fn get(&self, index: usize) -> Option<&LineEligibility> {
        self.lines.get(index)
    }

    /// Entry for the line with `line_id`.
    pub fn for_line(&self, line_id: &str) -> Option<&LineEligibility> {
        self.lines.iter().find(|e| e.line_id == line_id)
    }

    /// Sum of WIC-eligible amounts.
    pub fn wic_eligible_total(&self) -> Money {
        self.lines.iter().map(|e| e.wic_eligible_amount).sum()
    }

    /// Sum of SNAP-eligible amounts.
    pub fn snap_eligible_total(&self) -> Money {
        self.lines.iter().map(|e| e.snap_eligible_amount).sum()
    }

    /// Number of lines covered.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when no lines are covered.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes eligibility for `lines` against the customer's prescriptions.
///
/// Pass an empty slice when no WIC card was presented.
pub fn calculate(lines: &[LineItem], prescriptions: &[WicPrescription]) -> TransactionEligibility {
    let mut remaining: Vec<WicPrescription> = prescriptions.to_vec();

    let entries = lines
        .iter()
        .map(|line| {
            let gross = line.gross_extended_price();
            let (wic_eligible_amount, wic_eligible_units, wic_rejection) =
                wic_eligibility(line, &mut remaining);

            let entry = LineEligibility {
                line_id: line.id.clone(),
                wic_eligible_amount,
                wic_eligible_units,
                snap_eligible_amount: if line.is_snap_eligible {
                    gross
                } else {
                    Money::zero()
                },
                is_snap_taxable: line.is_taxable(),
                wic_rejection,
            };

            debug!(
                line_id = %entry.line_id,
                wic = %entry.wic_eligible_amount,
                snap = %entry.snap_eligible_amount,
                snap_taxable = entry.is_snap_taxable,
                "Line eligibility"
            );
            entry
        })
        .collect();

    TransactionEligibility { lines: entries }
}

/// WIC amount, units and rejection for one line; consumes prescription units.
fn wic_eligibility(
    line: &LineItem,
    remaining: &mut [WicPrescription],
) -> (Money, i64, Option<WicRejection>) {
    if !line.is_wic_approved {
        return (Money::zero(), 0, None);
    }

    let rx = match wic::check_line(line, remaining) {
        Ok(index) => &mut remaining[index],
        Err(rejection) => return (Money::zero(), 0, Some(rejection)),
    };

    let units = rx.allowed_quantity_remaining.min(line.quantity);
    rx.allowed_quantity_remaining -= units;

    let amount = line
        .unit_price
        .multiply_quantity(units)
        .min(line.gross_extended_price());
    (amount, units, None)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxRate;
    use rust_decimal_macros::dec;

    fn rate() -> TaxRate {
        TaxRate::from_percent(dec!(9.5))
    }

    fn milk(id: &str, qty: i64) -> LineItem {
        LineItem::new(id, "Milk", qty, Money::from_cents(429))
            .snap_eligible()
            .wic_approved("milk")
    }

    #[test]
    fn test_snap_eligibility_is_full_gross() {
        let chips = LineItem::new("1", "Chips", 2, Money::from_cents(399))
            .with_crv(Money::from_cents(5))
            .with_tax_rate(rate())
            .snap_eligible();
        let towels = LineItem::new("2", "Paper Towels", 1, Money::from_cents(599))
            .with_tax_rate(rate());

        let elig = calculate(&[chips, towels], &[]);
        let chips = elig.get(0).unwrap();
        assert_eq!(chips.snap_eligible_amount.cents(), 808);
        assert!(chips.is_snap_taxable);

        let towels = elig.get(1).unwrap();
        assert_eq!(towels.snap_eligible_amount, Money::zero());
        assert_eq!(elig.snap_eligible_total().cents(), 808);
    }

    #[test]
    fn test_wic_eligibility_capped_by_prescription_units() {
        let elig = calculate(&[milk("1", 3)], &[WicPrescription::new("milk", 2)]);
        let line = elig.get(0).unwrap();
        assert_eq!(line.wic_eligible_units, 2);
        assert_eq!(line.wic_eligible_amount.cents(), 858);
    }

    #[test]
    fn test_wic_units_are_shared_across_lines() {
        let lines = [milk("1", 1), milk("2", 1)];
        let elig = calculate(&lines, &[WicPrescription::new("milk", 1)]);

        assert_eq!(elig.get(0).unwrap().wic_eligible_amount.cents(), 429);
        assert_eq!(elig.get(1).unwrap().wic_eligible_amount, Money::zero());
        assert_eq!(
            elig.get(1).unwrap().wic_rejection,
            Some(WicRejection::QuantityExhausted {
                category: "milk".to_string()
            })
        );
    }

    #[test]
    fn test_wic_amount_clipped_to_discounted_gross() {
        let line = milk("1", 2).with_discount(Money::from_cents(100));
        let elig = calculate(&[line], &[WicPrescription::new("milk", 5)]);
        // 2 × 4.29 = 8.58, gross = 2 × 3.29 = 6.58
        assert_eq!(elig.get(0).unwrap().wic_eligible_amount.cents(), 658);
    }

    #[test]
    fn test_no_prescription_means_no_wic() {
        let elig = calculate(&[milk("1", 1)], &[]);
        let line = elig.for_line("1").unwrap();
        assert_eq!(line.wic_eligible_amount, Money::zero());
        assert_eq!(
            line.wic_rejection,
            Some(WicRejection::NoPrescription {
                category: "milk".to_string()
            })
        );
    }

    #[test]
    fn test_brand_restriction_applies() {
        let cereal = LineItem::new("1", "Frosted Flakes", 1, Money::from_cents(499))
            .wic_approved("cereal")
            .with_brand("Kelloggs");
        let rx = WicPrescription::new("cereal", 1).with_brands(["General Mills"]);

        let elig = calculate(&[cereal], &[rx]);
        assert_eq!(elig.wic_eligible_total(), Money::zero());
        assert!(matches!(
            elig.get(0).unwrap().wic_rejection,
            Some(WicRejection::BrandNotAllowed { .. })
        ));
    }
}
