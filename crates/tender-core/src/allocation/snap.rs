//! # SNAP Allocator
//!
//! Places a SNAP payment where it saves the most tax.
//!
//! ## Priority (fixed, never caller-ordered)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Tier 1: taxable SNAP-eligible lines                                    │
//! │          highest tax rate first, ties by line index                     │
//! │  Tier 2: non-taxable SNAP-eligible lines, by line index                 │
//! │                                                                         │
//! │  Bread $3.50 (no tax) + Soda $2.59 (+$0.25 tax), SNAP $6.00:            │
//! │    1. Soda  ← $2.59   tax $0.25 → $0.00                                 │
//! │    2. Bread ← $3.41                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each line is filled up to its unpaid SNAP-eligible amount before the next
//! is touched, and its tax is re-derived immediately. Whatever cannot be
//! placed comes back as `unapplied` for another tender.
//!
//! When WIC reservation is on, the part of a line reserved for WIC is not
//! SNAP capacity, which keeps the two benefit tenders independent of the
//! order they are presented in.

use std::cmp::Ordering;
use tracing::debug;

use super::{fit_to_balance, with_benefit, BenefitAllocation, LineAllocation};
use crate::eligibility::{LineEligibility, TransactionEligibility};
use crate::money::Money;
use crate::types::{LineItem, TenderType};

/// How much more SNAP this line can take.
pub fn snap_capacity(line: &LineItem, eligibility: &LineEligibility, reserve_wic: bool) -> Money {
    if !line.is_snap_eligible {
        return Money::zero();
    }

    let wic_claim = if reserve_wic {
        line.wic_paid_amount.max(eligibility.wic_eligible_amount)
    } else {
        line.wic_paid_amount
    };
    let ceiling = eligibility
        .snap_eligible_amount
        .min(line.gross_extended_price().saturating_sub(wic_claim));
    ceiling.saturating_sub(line.snap_paid_amount)
}

/// Line indices in SNAP priority order, restricted to lines with capacity.
pub fn priority_order(
    lines: &[LineItem],
    eligibility: &TransactionEligibility,
    reserve_wic: bool,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(index, line)| {
            eligibility
                .get(*index)
                .map_or(false, |e| snap_capacity(line, e, reserve_wic).is_positive())
        })
        .map(|(index, _)| index)
        .collect();

    let taxable = |index: usize| eligibility.get(index).map_or(false, |e| e.is_snap_taxable);

    candidates.sort_by(|&a, &b| {
        let (a_taxable, b_taxable) = (taxable(a), taxable(b));
        b_taxable
            .cmp(&a_taxable)
            .then_with(|| {
                if a_taxable && b_taxable {
                    lines[b].tax_rate.cmp(&lines[a].tax_rate)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.cmp(&b))
    });
    candidates
}

/// Applies up to `amount` of SNAP without taking the balance below zero.
pub fn allocate(
    lines: &[LineItem],
    eligibility: &TransactionEligibility,
    amount: Money,
    balance: Money,
    reserve_wic: bool,
) -> BenefitAllocation {
    let mut updated = lines.to_vec();
    let mut remaining = amount;
    let mut balance = balance;
    let mut allocations = Vec::new();

    for index in priority_order(lines, eligibility, reserve_wic) {
        if !remaining.is_positive() || !balance.is_positive() {
            break;
        }
        let Some(line_eligibility) = eligibility.get(index) else {
            continue;
        };

        let line = &updated[index];
        let room = snap_capacity(line, line_eligibility, reserve_wic).min(remaining);
        let old_tax = line.tax_total;
        let increment = fit_to_balance(room, balance, |x| {
            old_tax - with_benefit(line, TenderType::Snap, x).tax_total
        });
        if increment.is_zero() {
            continue;
        }

        let next = with_benefit(line, TenderType::Snap, increment);
        let tax_removed = old_tax - next.tax_total;
        debug!(
            line_id = %next.id,
            amount = %increment,
            tax_removed = %tax_removed,
            "SNAP applied to line"
        );

        remaining -= increment;
        balance -= increment + tax_removed;
        allocations.push(LineAllocation {
            line_id: next.id.clone(),
            amount: increment,
            wic_units: 0,
        });
        updated[index] = next;
    }

    BenefitAllocation {
        lines: updated,
        applied: amount - remaining,
        unapplied: remaining,
        allocations,
        rejected: Vec::new(),
        prescriptions: Vec::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility;
    use crate::types::{TaxRate, WicPrescription};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn line(id: &str, cents: i64, pct: Decimal) -> LineItem {
        LineItem::new(id, id, 1, Money::from_cents(cents))
            .with_tax_rate(TaxRate::from_percent(pct))
            .snap_eligible()
    }

    fn big_balance() -> Money {
        Money::from_cents(1_000_000)
    }

    #[test]
    fn test_taxable_lines_are_covered_first() {
        let lines = vec![line("bread", 350, dec!(0)), line("soda", 259, dec!(9.5))];
        let elig = eligibility::calculate(&lines, &[]);

        let result = allocate(&lines, &elig, Money::from_cents(600), big_balance(), true);

        assert_eq!(result.lines[1].snap_paid_amount.cents(), 259);
        assert_eq!(result.lines[1].tax_total, Money::zero());
        assert_eq!(result.lines[0].snap_paid_amount.cents(), 341);
        assert_eq!(result.applied.cents(), 600);
        assert_eq!(result.unapplied, Money::zero());
        assert_eq!(result.allocations[0].line_id, "soda");
    }

    #[test]
    fn test_higher_rate_first_then_index() {
        let lines = vec![
            line("a", 100, dec!(7.25)),
            line("b", 100, dec!(9.5)),
            line("c", 100, dec!(9.5)),
            line("d", 100, dec!(0)),
        ];
        let elig = eligibility::calculate(&lines, &[]);
        assert_eq!(priority_order(&lines, &elig, true), vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_remainder_is_returned() {
        let lines = vec![line("chips", 399, dec!(9.5))];
        let elig = eligibility::calculate(&lines, &[]);

        let result = allocate(&lines, &elig, Money::from_cents(1000), big_balance(), true);
        assert_eq!(result.applied.cents(), 399);
        assert_eq!(result.unapplied.cents(), 601);
    }

    #[test]
    fn test_non_snap_lines_are_never_touched() {
        let towels = LineItem::new("towels", "Paper Towels", 1, Money::from_cents(599))
            .with_tax_rate(TaxRate::from_percent(dec!(9.5)));
        let lines = vec![towels];
        let elig = eligibility::calculate(&lines, &[]);

        let result = allocate(&lines, &elig, Money::from_cents(599), big_balance(), true);
        assert_eq!(result.applied, Money::zero());
        assert_eq!(result.lines, lines);
    }

    #[test]
    fn test_wic_reservation_is_respected() {
        let milk = line("milk", 429, dec!(0)).wic_approved("milk");
        let lines = vec![milk];
        let elig = eligibility::calculate(&lines, &[WicPrescription::new("milk", 1)]);

        let reserved = allocate(&lines, &elig, Money::from_cents(429), big_balance(), true);
        assert_eq!(reserved.applied, Money::zero());

        let open = allocate(&lines, &elig, Money::from_cents(429), big_balance(), false);
        assert_eq!(open.applied.cents(), 429);
    }

    #[test]
    fn test_balance_caps_increment() {
        let lines = vec![line("soda", 259, dec!(9.5))];
        let elig = eligibility::calculate(&lines, &[]);

        // Only $1.00 left to pay on a $2.84 transaction
        let result = allocate(&lines, &elig, Money::from_cents(259), Money::from_cents(100), true);
        let tax_removed = lines[0].tax_total - result.lines[0].tax_total;
        assert!(result.applied + tax_removed <= Money::from_cents(100));
        assert!(result.applied.is_positive());
    }

    #[test]
    fn test_input_snapshot_is_untouched() {
        let lines = vec![line("soda", 259, dec!(9.5))];
        let before = lines.clone();
        let elig = eligibility::calculate(&lines, &[]);

        let _ = allocate(&lines, &elig, Money::from_cents(259), big_balance(), true);
        assert_eq!(lines, before);
    }
}
