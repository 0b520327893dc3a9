//! # Payment Orchestrator
//!
//! Owns one transaction's payment phase: freezes eligibility, dispatches each
//! tender to its allocator, keeps the payment ledger and checks every money
//! invariant before a new state is committed.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  new(config)                                                            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  begin_payment(lines, prescriptions)   eligibility frozen               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  apply_payment(request) ◄──────┐       WIC → wic, SNAP → snap,          │
//! │  void_payment(id)       ───────┘       anything else → regular          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  totals() / snapshot()                 handed to persistence            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Order Does Not Matter
//! - Benefit tenders use a fixed line priority, never the call order.
//! - Tax is re-derived from paid amounts, never carried forward.
//! - Regular tenders form one pool that is re-spread from scratch after
//!   every change.
//! - With WIC reservation on, SNAP never competes with WIC for a line.
//!
//! The orchestrator is a plain value with no locking. Callers serialize
//! access to one transaction (the checkout layer wraps it in a mutex).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::allocation::{regular, snap, wic, LineAllocation};
use crate::config::EngineConfig;
use crate::eligibility::{self, TransactionEligibility};
use crate::error::{AllocationError, EngineError, EngineResult, IneligibleLine};
use crate::money::Money;
use crate::recalc;
use crate::types::{LineItem, PaymentRequest, TenderType, WicPrescription};
use crate::validation;

// =============================================================================
// Totals
// =============================================================================

/// Transaction totals, always derived from the lines and the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Merchandise after discounts, before CRV and tax.
    pub subtotal: Money,
    pub discount_total: Money,
    pub crv_total: Money,
    pub tax_total: Money,
    /// `subtotal + crv_total + tax_total`
    pub grand_total: Money,
    /// Applied amounts of active payments.
    pub amount_paid: Money,
    /// `grand_total - amount_paid`
    pub balance_remaining: Money,
    pub snap_paid: Money,
    pub wic_paid: Money,
    /// Tax removed by benefit tenders.
    pub tax_saved: Money,
}

impl Totals {
    fn compute(lines: &[LineItem], amount_paid: Money, baseline_tax: Money) -> Self {
        let subtotal: Money = lines.iter().map(LineItem::merchandise_total).sum();
        let crv_total: Money = lines.iter().map(LineItem::crv_total).sum();
        let tax_total: Money = lines.iter().map(|l| l.tax_total).sum();
        let grand_total = subtotal + crv_total + tax_total;

        Totals {
            subtotal,
            discount_total: lines.iter().map(LineItem::discount_total).sum(),
            crv_total,
            tax_total,
            grand_total,
            amount_paid,
            balance_remaining: grand_total - amount_paid,
            snap_paid: lines.iter().map(|l| l.snap_paid_amount).sum(),
            wic_paid: lines.iter().map(|l| l.wic_paid_amount).sum(),
            tax_saved: baseline_tax - tax_total,
        }
    }

    /// True when nothing is left to pay.
    pub fn is_paid(&self) -> bool {
        !self.balance_remaining.is_positive()
    }
}

// =============================================================================
// Payment Ledger
// =============================================================================

/// Whether a payment still counts toward the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Active,
    Voided,
}

/// One accepted payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub tender: TenderType,
    /// Amount the customer offered.
    pub requested: Money,
    /// Amount that settles the balance.
    pub applied: Money,
    pub change_due: Money,
    /// Where the payment landed when it was accepted.
    pub allocations: Vec<LineAllocation>,
    pub status: PaymentStatus,
    pub accepted_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    /// Counts toward the balance.
    pub fn is_active(&self) -> bool {
        self.status == PaymentStatus::Active
    }
}

/// Outcome of `apply_payment`.
///
/// `requested = applied_amount + unapplied_remainder + change_due`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Ledger id; `None` when a benefit tender found nothing to pay.
    pub payment_id: Option<Uuid>,
    pub tender: TenderType,
    pub requested: Money,
    pub applied_amount: Money,
    /// Benefit amount that found no line; route it to another tender.
    pub unapplied_remainder: Money,
    pub change_due: Money,
    pub updated_line_items: Vec<LineItem>,
    pub line_allocations: Vec<LineAllocation>,
    /// WIC lines skipped, with reasons.
    pub rejected_lines: Vec<IneligibleLine>,
    /// Prescriptions after this payment (WIC only), for the card service.
    pub prescriptions: Vec<WicPrescription>,
    pub totals: Totals,
}

/// WIC units a void hands back for one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WicUnitRelease {
    pub line_id: String,
    pub category: String,
    pub units: i64,
}

/// Outcome of `void_payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidResult {
    pub payment_id: Uuid,
    pub tender: TenderType,
    /// False when the payment was already voided.
    pub voided: bool,
    /// Units to return to the WIC card, from the lines' WIC-paid amounts
    /// before and after the void.
    pub released_wic_units: Vec<WicUnitRelease>,
    pub totals: Totals,
}

/// Everything needed to rebuild an orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub lines: Vec<LineItem>,
    pub eligibility: TransactionEligibility,
    pub payments: Vec<PaymentRecord>,
    /// Tax before any benefit was applied.
    pub baseline_tax: Money,
    pub totals: Totals,
    pub taken_at: DateTime<Utc>,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Payment phase of one transaction.
#[derive(Debug, Clone)]
pub struct PaymentOrchestrator {
    config: EngineConfig,
    lines: Vec<LineItem>,
    eligibility: Option<TransactionEligibility>,
    payments: Vec<PaymentRecord>,
    baseline_tax: Money,
}

/// Candidate state, committed only after the invariants hold.
struct Pending {
    lines: Vec<LineItem>,
    payments: Vec<PaymentRecord>,
}

impl PaymentOrchestrator {
    /// Creates an orchestrator with no transaction.
    pub fn new(config: EngineConfig) -> Self {
        PaymentOrchestrator {
            config,
            lines: Vec::new(),
            eligibility: None,
            payments: Vec::new(),
            baseline_tax: Money::zero(),
        }
    }

    /// Freezes the lines and computes eligibility.
    ///
    /// May be repeated while no payment has been accepted (the cart changed);
    /// after that it fails with `AlreadyStarted`. Paid amounts on the incoming
    /// lines are ignored.
    pub fn begin_payment(
        &mut self,
        lines: Vec<LineItem>,
        prescriptions: &[WicPrescription],
    ) -> EngineResult<TransactionEligibility> {
        if !self.payments.is_empty() {
            return Err(EngineError::AlreadyStarted);
        }
        if lines.is_empty() {
            return Err(EngineError::EmptyTransaction);
        }
        validation::validate_lines(&lines)?;

        let lines: Vec<LineItem> = lines.iter().map(LineItem::unpaid).collect();
        let eligibility = eligibility::calculate(&lines, prescriptions);

        self.baseline_tax = lines.iter().map(|l| l.tax_total).sum();
        self.lines = lines;
        self.eligibility = Some(eligibility.clone());

        let totals = self.totals();
        info!(
            lines = self.lines.len(),
            grand_total = %totals.grand_total,
            wic_eligible = %eligibility.wic_eligible_total(),
            snap_eligible = %eligibility.snap_eligible_total(),
            "Payment started"
        );
        Ok(eligibility)
    }

    /// Runs every refusal `apply_payment` would make, without applying.
    ///
    /// The checkout layer calls this before charging a card.
    pub fn preflight(&self, request: &PaymentRequest) -> EngineResult<()> {
        self.frozen_eligibility()?;
        validation::validate_payment_amount(request.amount)?;

        let active = self.payments.iter().filter(|p| p.is_active()).count();
        if active >= self.config.max_tenders {
            return Err(EngineError::TooManyTenders {
                max: self.config.max_tenders,
            });
        }

        let balance = self.balance();
        if request.tender.is_benefit() {
            if !balance.is_positive() {
                return Err(AllocationError::AlreadyPaid.into());
            }
        } else {
            regular::check_tender(
                request.tender,
                request.amount,
                balance,
                self.config.allow_card_change,
            )?;
        }
        Ok(())
    }

    /// Applies one tender.
    pub fn apply_payment(&mut self, request: PaymentRequest) -> EngineResult<AllocationResult> {
        self.preflight(&request)?;
        let eligibility = self.frozen_eligibility()?;
        let balance = self.balance();
        let pool = self.regular_pool();

        let (lines, applied, unapplied, change_due, allocations, rejected, prescriptions) =
            match request.tender {
                TenderType::Wic | TenderType::Snap => {
                    let benefit = if request.tender == TenderType::Wic {
                        wic::allocate(
                            &self.lines,
                            eligibility,
                            request.amount,
                            balance,
                            &request.prescriptions,
                        )?
                    } else {
                        snap::allocate(
                            &self.lines,
                            eligibility,
                            request.amount,
                            balance,
                            self.config.reserve_wic_eligible,
                        )
                    };
                    let (lines, _) = regular::distribute(&benefit.lines, pool);
                    (
                        lines,
                        benefit.applied,
                        benefit.unapplied,
                        Money::zero(),
                        benefit.allocations,
                        benefit.rejected,
                        benefit.prescriptions,
                    )
                }
                tender => {
                    let outcome = regular::allocate(
                        &self.lines,
                        pool,
                        tender,
                        request.amount,
                        balance,
                        self.config.allow_card_change,
                    )?;
                    let allocations = regular_allocations(&self.lines, &outcome.lines);
                    (
                        outcome.lines,
                        outcome.applied,
                        Money::zero(),
                        outcome.change_due,
                        allocations,
                        Vec::new(),
                        Vec::new(),
                    )
                }
            };

        let mut payments = self.payments.clone();
        let payment_id = if applied.is_positive() {
            let id = Uuid::new_v4();
            payments.push(PaymentRecord {
                id,
                tender: request.tender,
                requested: request.amount,
                applied,
                change_due,
                allocations: allocations.clone(),
                status: PaymentStatus::Active,
                accepted_at: Utc::now(),
                voided_at: None,
            });
            Some(id)
        } else {
            debug!(tender = %request.tender, "Benefit tender found nothing to pay");
            None
        };

        self.commit(Pending { lines, payments })?;
        let totals = self.totals();

        if let Some(id) = payment_id {
            info!(
                payment_id = %id,
                tender = %request.tender,
                applied = %applied,
                unapplied = %unapplied,
                change_due = %change_due,
                balance = %totals.balance_remaining,
                "Payment accepted"
            );
        }

        Ok(AllocationResult {
            payment_id,
            tender: request.tender,
            requested: request.amount,
            applied_amount: applied,
            unapplied_remainder: unapplied,
            change_due,
            updated_line_items: self.lines.clone(),
            line_allocations: allocations,
            rejected_lines: rejected,
            prescriptions,
            totals,
        })
    }

    /// Reverses an accepted payment.
    ///
    /// Voiding an already voided payment does nothing.
    ///
    /// ## WIC Units
    /// A unit partly paid by two WIC payments is counted by whichever one
    /// opened it, so the units on the record are not what a void frees.
    /// Released units are `units_of(wic_paid)` before minus after, per line:
    /// ```text
    /// milk × 2 @ 4.29, card milk = 2
    ///   P1 WIC 2.00  wic_paid 2.00  units 1  (P1 opened unit 1)
    ///   P2 WIC 2.29  wic_paid 4.29  units 1  (P2 opened nothing)
    ///   void P1      wic_paid 2.29  units 1  released 0, unit 1 still open
    /// ```
    pub fn void_payment(&mut self, payment_id: Uuid) -> EngineResult<VoidResult> {
        self.frozen_eligibility()?;
        let index = self
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(EngineError::PaymentNotFound(payment_id))?;

        let record = &self.payments[index];
        if !record.is_active() {
            debug!(payment_id = %payment_id, "Payment already voided");
            return Ok(VoidResult {
                payment_id,
                tender: record.tender,
                voided: false,
                released_wic_units: Vec::new(),
                totals: self.totals(),
            });
        }

        let mut lines = self.lines.clone();
        if record.tender.is_benefit() {
            for allocation in &record.allocations {
                let Some(line) = lines.iter_mut().find(|l| l.id == allocation.line_id) else {
                    return Err(self.violation(&allocation.line_id, "voided allocation has no line"));
                };
                match record.tender {
                    TenderType::Snap => line.snap_paid_amount -= allocation.amount,
                    _ => line.wic_paid_amount -= allocation.amount,
                }
                *line = recalc::recalculate_line(line);
            }
        }

        let tender = record.tender;
        let applied = record.applied;
        let mut payments = self.payments.clone();
        payments[index].status = PaymentStatus::Voided;
        payments[index].voided_at = Some(Utc::now());

        let released_wic_units = if tender == TenderType::Wic {
            released_units(&self.lines, &lines)
        } else {
            Vec::new()
        };

        let pool = pool_of(&payments);
        let (lines, _) = regular::distribute(&lines, pool);
        self.commit(Pending { lines, payments })?;

        info!(
            payment_id = %payment_id,
            tender = %tender,
            applied = %applied,
            balance = %self.totals().balance_remaining,
            wic_units = released_wic_units.iter().map(|r| r.units).sum::<i64>(),
            "Payment voided"
        );
        Ok(VoidResult {
            payment_id,
            tender,
            voided: true,
            released_wic_units,
            totals: self.totals(),
        })
    }

    /// Current totals.
    pub fn totals(&self) -> Totals {
        Totals::compute(&self.lines, self.amount_paid(), self.baseline_tax)
    }

    /// Serializable copy of the transaction.
    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            lines: self.lines.clone(),
            eligibility: self.eligibility.clone().unwrap_or_default(),
            payments: self.payments.clone(),
            baseline_tax: self.baseline_tax,
            totals: self.totals(),
            taken_at: Utc::now(),
        }
    }

    /// Rebuilds an orchestrator from a snapshot, re-checking every invariant.
    pub fn restore(config: EngineConfig, snapshot: TransactionSnapshot) -> EngineResult<Self> {
        config.validate()?;
        if snapshot.lines.is_empty() {
            return Err(EngineError::EmptyTransaction);
        }
        validation::validate_lines(&snapshot.lines)?;

        let eligibility = snapshot.eligibility;
        check_invariants(&snapshot.lines, &eligibility, &snapshot.payments)?;

        Ok(PaymentOrchestrator {
            config,
            lines: snapshot.lines,
            eligibility: Some(eligibility),
            payments: snapshot.payments,
            baseline_tax: snapshot.baseline_tax,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Every payment, voided ones included, in acceptance order.
    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub fn payment(&self, payment_id: Uuid) -> Option<&PaymentRecord> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    /// Frozen eligibility, once `begin_payment` has run.
    pub fn eligibility(&self) -> Option<&TransactionEligibility> {
        self.eligibility.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.eligibility.is_some()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn frozen_eligibility(&self) -> EngineResult<&TransactionEligibility> {
        self.eligibility.as_ref().ok_or(EngineError::NotStarted)
    }

    fn amount_paid(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.applied)
            .sum()
    }

    /// `grand_total - Σ applied`, recomputed from the lines every time.
    fn balance(&self) -> Money {
        self.totals().balance_remaining
    }

    fn regular_pool(&self) -> Money {
        pool_of(&self.payments)
    }

    fn commit(&mut self, pending: Pending) -> EngineResult<()> {
        let eligibility = self.frozen_eligibility()?;
        check_invariants(&pending.lines, eligibility, &pending.payments)?;
        self.lines = pending.lines;
        self.payments = pending.payments;
        Ok(())
    }

    fn violation(&self, line_id: &str, detail: &str) -> EngineError {
        error!(line_id = %line_id, detail = %detail, "Rounding invariant violated");
        EngineError::RoundingInvariantViolation {
            line_id: line_id.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Applied amount of active regular tenders.
fn pool_of(payments: &[PaymentRecord]) -> Money {
    payments
        .iter()
        .filter(|p| p.is_active() && !p.tender.is_benefit())
        .map(|p| p.applied)
        .sum()
}

/// Per-line growth of the regular pool between two states.
fn regular_allocations(before: &[LineItem], after: &[LineItem]) -> Vec<LineAllocation> {
    before
        .iter()
        .zip(after)
        .filter_map(|(old, new)| {
            let delta = (new.non_benefit_paid_amount + new.tax_paid_amount)
                - (old.non_benefit_paid_amount + old.tax_paid_amount);
            delta.is_positive().then(|| LineAllocation {
                line_id: new.id.clone(),
                amount: delta,
                wic_units: 0,
            })
        })
        .collect()
}

/// WIC units freed per line going from `before` to `after`.
fn released_units(before: &[LineItem], after: &[LineItem]) -> Vec<WicUnitRelease> {
    before
        .iter()
        .zip(after)
        .filter_map(|(old, new)| {
            let units = old.wic_paid_amount.units_of(old.unit_price)
                - new.wic_paid_amount.units_of(new.unit_price);
            let category = old.wic_category.clone()?;
            (units > 0).then(|| WicUnitRelease {
                line_id: old.id.clone(),
                category,
                units,
            })
        })
        .collect()
}

// =============================================================================
// Invariants
// =============================================================================

/// Checks every money invariant of a candidate state.
///
/// ```text
/// per line:   paid amounts ≥ 0
///             snap + wic + non_benefit ≤ gross
///             tax fields == recalculate_line(line)
///             tax_paid ≤ tax_total
///             wic ≤ wic_eligible, snap ≤ snap_eligible
/// per txn:    Σ line payments == Σ applied (active payments)
///             balance ≥ 0
/// ```
pub fn check_invariants(
    lines: &[LineItem],
    eligibility: &TransactionEligibility,
    payments: &[PaymentRecord],
) -> EngineResult<()> {
    let fail = |line_id: &str, detail: String| {
        error!(line_id = %line_id, detail = %detail, "Rounding invariant violated");
        Err(EngineError::RoundingInvariantViolation {
            line_id: line_id.to_string(),
            detail,
        })
    };

    if eligibility.len() != lines.len() {
        return fail(
            "*",
            format!(
                "eligibility covers {} lines, transaction has {}",
                eligibility.len(),
                lines.len()
            ),
        );
    }

    for (line, line_eligibility) in lines.iter().zip(eligibility.lines()) {
        let amounts = [
            line.snap_paid_amount,
            line.wic_paid_amount,
            line.non_benefit_paid_amount,
            line.tax_paid_amount,
        ];
        if amounts.iter().any(Money::is_negative) {
            return fail(line.id.as_str(), "negative paid amount".to_string());
        }

        let gross = line.gross_extended_price();
        if line.merchandise_paid() > gross {
            return fail(
                line.id.as_str(),
                format!("paid {} exceeds gross {}", line.merchandise_paid(), gross),
            );
        }

        let derived = recalc::recalculate_line(line);
        if derived.tax_total != line.tax_total
            || derived.tax_per_unit != line.tax_per_unit
            || derived.subject_to_tax_total != line.subject_to_tax_total
        {
            return fail(
                line.id.as_str(),
                format!("tax {} does not match derived {}", line.tax_total, derived.tax_total),
            );
        }

        if line.tax_paid_amount > line.tax_total {
            return fail(
                line.id.as_str(),
                format!("tax paid {} exceeds tax {}", line.tax_paid_amount, line.tax_total),
            );
        }
        if line.wic_paid_amount > line_eligibility.wic_eligible_amount {
            return fail(line.id.as_str(), "WIC paid exceeds WIC eligibility".to_string());
        }
        if line.snap_paid_amount > line_eligibility.snap_eligible_amount {
            return fail(line.id.as_str(), "SNAP paid exceeds SNAP eligibility".to_string());
        }
    }

    let on_lines: Money = lines
        .iter()
        .map(|l| l.merchandise_paid() + l.tax_paid_amount)
        .sum();
    let applied: Money = payments
        .iter()
        .filter(|p| p.is_active())
        .map(|p| p.applied)
        .sum();
    if on_lines != applied {
        return fail(
            "*",
            format!("lines carry {on_lines} but payments applied {applied}"),
        );
    }

    let totals = Totals::compute(lines, applied, Money::zero());
    if totals.balance_remaining.is_negative() {
        return fail(
            "*",
            format!("balance went negative: {}", totals.balance_remaining),
        );
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
