//! # Allocation Strategies
//!
//! Pure functions that spread one tender over the line items.
//!
//! ## Allocators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  snap     SNAP over SNAP-eligible lines, taxable (highest rate) first   │
//! │  wic      WIC over prescription-validated lines, line order             │
//! │  regular  Cash/Credit/Debit/EBT-Cash/Check, non-SNAP lines first        │
//! │                                                                         │
//! │  Every allocator takes `&[LineItem]` and returns a NEW Vec<LineItem>.   │
//! │  The input snapshot is never mutated.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Benefit Increments and the Balance
//! A benefit dollar on a taxable line lowers the balance twice: once for the
//! payment itself and once for the tax it removes. Benefit increments are
//! therefore shrunk to the largest whole-cent amount for which
//! `increment + tax removed ≤ balance`, so the balance never goes negative.

pub mod regular;
pub mod snap;
pub mod wic;

use serde::{Deserialize, Serialize};

use crate::error::IneligibleLine;
use crate::money::Money;
use crate::recalc;
use crate::types::{LineItem, TenderType, WicPrescription};

/// Amount one tender placed on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAllocation {
    pub line_id: String,
    pub amount: Money,
    /// Prescription units consumed (WIC only).
    #[serde(default)]
    pub wic_units: i64,
}

/// Output of a benefit (SNAP or WIC) allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitAllocation {
    /// Updated snapshot, tax already re-derived on every touched line.
    pub lines: Vec<LineItem>,
    /// Total placed on lines.
    pub applied: Money,
    /// Requested minus applied; for the caller to route to another tender.
    pub unapplied: Money,
    /// Per-line amounts, in the order they were applied.
    pub allocations: Vec<LineAllocation>,
    /// WIC lines skipped, with reasons.
    pub rejected: Vec<IneligibleLine>,
    /// Prescriptions after the units this tender consumed (WIC only).
    pub prescriptions: Vec<WicPrescription>,
}

/// Returns `line` with `amount` more of `tender` paid and tax re-derived.
///
/// Only benefit tenders are tracked per line; anything else is returned
/// unchanged.
pub(crate) fn with_benefit(line: &LineItem, tender: TenderType, amount: Money) -> LineItem {
    let mut next = line.clone();
    match tender {
        TenderType::Snap => next.snap_paid_amount += amount,
        TenderType::Wic => next.wic_paid_amount += amount,
        _ => return next,
    }
    recalc::recalculate_line(&next)
}

/// Largest increment `≤ room` with `increment + tax_removed(increment) ≤ balance`.
///
/// `tax_removed` must be non-decreasing in its argument, which holds for
/// tax re-derived from a shrinking taxable basis.
pub(crate) fn fit_to_balance<F>(room: Money, balance: Money, tax_removed: F) -> Money
where
    F: Fn(Money) -> Money,
{
    let ceiling = room.min(balance);
    if !ceiling.is_positive() {
        return Money::zero();
    }

    let fits = |cents: i64| {
        let x = Money::from_cents(cents);
        x + tax_removed(x) <= balance
    };

    if fits(ceiling.cents()) {
        return ceiling;
    }

    // fits(lo) holds, fits(hi) does not
    let (mut lo, mut hi) = (0_i64, ceiling.cents());
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Money::from_cents(lo)
}

// =============================================================================
// Unit Tests
// =============================================================================
