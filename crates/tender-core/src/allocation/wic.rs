//! # WIC Allocator
//!
//! Applies a WIC payment to prescription-validated lines in line order.
//!
//! ## Per-Line Validation
//! ```text
//! is_wic_approved && wic_paid < wic_eligible_amount
//!        │
//!        ▼
//! category present? ── no ──► MissingCategory
//!        │
//! prescription for category? ── no ──► NoPrescription
//!        │
//! brand in allow-list (if any)? ── no ──► BrandNotAllowed
//!        │
//! size in allow-list (if any)? ── no ──► SizeNotAllowed
//!        │
//! units left (or a unit already part-paid)? ── no ──► QuantityExhausted
//!        │
//!        ▼
//!   line validates
//! ```
//!
//! A failing line is skipped and reported; the call only fails when no line
//! validates at all (`NoEligibleItems`). Each validated line is capped by its
//! frozen WIC eligibility, its unpaid gross and the units still on the
//! prescription. Units consumed are taken off a working copy of the
//! prescriptions, which is returned for the caller to write back to the card.

use tracing::{debug, warn};

use super::{fit_to_balance, with_benefit, BenefitAllocation, LineAllocation};
use crate::eligibility::TransactionEligibility;
use crate::error::{AllocationError, IneligibleLine, WicRejection};
use crate::money::Money;
use crate::types::{LineItem, TenderType, WicPrescription};

/// Checks one line against the prescriptions.
///
/// Returns the index of the matching prescription.
pub fn check_line(line: &LineItem, prescriptions: &[WicPrescription]) -> Result<usize, WicRejection> {
    let category = line
        .wic_category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(WicRejection::MissingCategory)?;

    let index = prescriptions
        .iter()
        .position(|rx| rx.covers_category(category))
        .ok_or_else(|| WicRejection::NoPrescription {
            category: category.to_string(),
        })?;
    let rx = &prescriptions[index];

    if !rx.allows_brand(line.brand.as_deref()) {
        return Err(WicRejection::BrandNotAllowed {
            category: category.to_string(),
            brand: line.brand.clone(),
        });
    }
    if !rx.allows_size(line.size.as_deref()) {
        return Err(WicRejection::SizeNotAllowed {
            category: category.to_string(),
            size: line.size.clone(),
        });
    }

    // A unit WIC already started paying was counted when it was started
    let covered = line.wic_paid_amount.units_of(line.unit_price);
    let open_unit = line.unit_price.multiply_quantity(covered) > line.wic_paid_amount;
    if rx.allowed_quantity_remaining <= 0 && !open_unit {
        return Err(WicRejection::QuantityExhausted {
            category: category.to_string(),
        });
    }

    Ok(index)
}

/// Applies up to `amount` of WIC.
///
/// `prescriptions` are the card's current prescriptions; they are not
/// modified, the decremented copy comes back in the result.
pub fn allocate(
    lines: &[LineItem],
    eligibility: &TransactionEligibility,
    amount: Money,
    balance: Money,
    prescriptions: &[WicPrescription],
) -> Result<BenefitAllocation, AllocationError> {
    let mut updated = lines.to_vec();
    let mut working = prescriptions.to_vec();
    let mut remaining = amount;
    let mut balance = balance;
    let mut allocations = Vec::new();
    let mut rejected = Vec::new();
    let mut validated = 0_usize;

    for (index, line_eligibility) in eligibility.lines().iter().enumerate() {
        let Some(line) = updated.get(index) else {
            break;
        };
        if !line.is_wic_approved {
            continue;
        }

        // Rejected when eligibility was frozen: report it on every WIC call
        if let Some(reason) = &line_eligibility.wic_rejection {
            if line_eligibility.wic_eligible_amount.is_zero() {
                rejected.push(IneligibleLine {
                    line_id: line.id.clone(),
                    reason: reason.clone(),
                });
                continue;
            }
        }
        if line.wic_paid_amount >= line_eligibility.wic_eligible_amount {
            continue;
        }

        let rx_index = match check_line(line, &working) {
            Ok(rx_index) => rx_index,
            Err(reason) => {
                warn!(line_id = %line.id, reason = %reason, "WIC line skipped");
                rejected.push(IneligibleLine {
                    line_id: line.id.clone(),
                    reason,
                });
                continue;
            }
        };
        validated += 1;

        if !remaining.is_positive() || !balance.is_positive() {
            continue;
        }

        let covered_before = line.wic_paid_amount.units_of(line.unit_price);
        let units_left = working[rx_index].allowed_quantity_remaining.max(0);
        let prescription_room = line
            .unit_price
            .multiply_quantity(covered_before + units_left)
            .saturating_sub(line.wic_paid_amount);

        let room = line_eligibility
            .wic_eligible_amount
            .saturating_sub(line.wic_paid_amount)
            .min(line.gross_extended_price().saturating_sub(line.benefit_paid()))
            .min(prescription_room)
            .min(remaining);

        let old_tax = line.tax_total;
        let increment = fit_to_balance(room, balance, |x| {
            old_tax - with_benefit(line, TenderType::Wic, x).tax_total
        });
        if increment.is_zero() {
            continue;
        }

        let next = with_benefit(line, TenderType::Wic, increment);
        let tax_removed = old_tax - next.tax_total;
        let units = next.wic_paid_amount.units_of(next.unit_price) - covered_before;
        working[rx_index].allowed_quantity_remaining -= units;

        debug!(
            line_id = %next.id,
            amount = %increment,
            units,
            category = %working[rx_index].category,
            "WIC applied to line"
        );

        remaining -= increment;
        balance -= increment + tax_removed;
        allocations.push(LineAllocation {
            line_id: next.id.clone(),
            amount: increment,
            wic_units: units,
        });
        updated[index] = next;
    }

    if validated == 0 {
        return Err(AllocationError::NoEligibleItems { rejected });
    }

    Ok(BenefitAllocation {
        lines: updated,
        applied: amount - remaining,
        unapplied: remaining,
        allocations,
        rejected,
        prescriptions: working,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
