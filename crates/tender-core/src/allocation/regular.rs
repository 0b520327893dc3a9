//! # Regular Allocator
//!
//! Cash, Credit, Debit, EBT-Cash and Check. No tax optimization.
//!
//! ## The Non-Benefit Pool
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pool = Σ applied over active regular tenders                           │
//! │                                                                         │
//! │  distribute(lines, pool):                                               │
//! │    1. lines that are NOT SNAP-eligible, by index                        │
//! │    2. SNAP-eligible lines, by index                                     │
//! │    on each line: merchandise due first, then tax due                    │
//! │                                                                         │
//! │  Re-run after every payment or void, so which regular tender paid       │
//! │  which line never depends on the order they were presented in.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Benefit allocations on a line are preserved; the pool only fills what
//! they leave.

use tracing::debug;

use crate::error::AllocationError;
use crate::money::Money;
use crate::types::{LineItem, TenderType};

/// Outcome of accepting one regular tender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularAllocation {
    /// Lines with the enlarged pool spread over them.
    pub lines: Vec<LineItem>,
    /// Part of the tender that settles the balance.
    pub applied: Money,
    /// Over-tender handed back.
    pub change_due: Money,
}

/// Refusals that depend only on the amount and the balance.
///
/// Shared by `allocate` and the orchestrator's preflight, so a card is never
/// charged for a payment the engine would refuse.
pub fn check_tender(
    tender: TenderType,
    amount: Money,
    balance: Money,
    allow_card_change: bool,
) -> Result<(), AllocationError> {
    if !balance.is_positive() {
        return Err(AllocationError::AlreadyPaid);
    }
    if amount > balance && !tender.gives_change() && !allow_card_change {
        return Err(AllocationError::OverTender {
            tender,
            offered: amount,
            balance,
        });
    }
    Ok(())
}

/// Accepts `amount` of `tender` on top of the existing `pool`.
pub fn allocate(
    lines: &[LineItem],
    pool: Money,
    tender: TenderType,
    amount: Money,
    balance: Money,
    allow_card_change: bool,
) -> Result<RegularAllocation, AllocationError> {
    check_tender(tender, amount, balance, allow_card_change)?;

    let applied = amount.min(balance);
    let change_due = amount - applied;
    let (lines, _) = distribute(lines, pool + applied);

    debug!(
        tender = %tender,
        applied = %applied,
        change_due = %change_due,
        pool = %(pool + applied),
        "Regular tender spread over lines"
    );

    Ok(RegularAllocation {
        lines,
        applied,
        change_due,
    })
}

/// Spreads `pool` over the lines from scratch.
///
/// Returns the updated lines and whatever the lines could not absorb. A
/// non-zero leftover means the pool exceeds what is owed.
pub fn distribute(lines: &[LineItem], pool: Money) -> (Vec<LineItem>, Money) {
    let mut updated: Vec<LineItem> = lines
        .iter()
        .map(|line| {
            let mut line = line.clone();
            line.non_benefit_paid_amount = Money::zero();
            line.tax_paid_amount = Money::zero();
            line
        })
        .collect();

    let order: Vec<usize> = (0..updated.len())
        .filter(|&i| !updated[i].is_snap_eligible)
        .chain((0..updated.len()).filter(|&i| updated[i].is_snap_eligible))
        .collect();

    let mut remaining = pool;
    for index in order {
        if !remaining.is_positive() {
            break;
        }
        let line = &mut updated[index];

        let merchandise = line.merchandise_due().min(remaining);
        line.non_benefit_paid_amount += merchandise;
        remaining -= merchandise;

        let tax = line.tax_due().min(remaining);
        line.tax_paid_amount += tax;
        remaining -= tax;
    }

    (updated, remaining)
}

// =============================================================================
// Unit Tests
// =============================================================================
