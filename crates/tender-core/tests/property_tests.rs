//! Property-based tests for the allocation invariants
//!
//! These hold for any cart and any multiset of payments, not just the
//! worked examples.

use proptest::prelude::*;
use tender_core::tax::tax_for_taxable_amount;
use tender_core::{
    EngineConfig, EngineError, LineItem, Money, PaymentOrchestrator, PaymentRequest, TaxRate,
    TenderType, WicPrescription,
};

// ============================================================================
// Generators
// ============================================================================

prop_compose! {
    fn arb_line()(
        price in 1i64..2_000,
        quantity in 1i64..4,
        crv in prop::sample::select(vec![0i64, 5, 10]),
        bps in prop::sample::select(vec![0u32, 725, 950]),
        snap in any::<bool>(),
        wic in prop::sample::select(vec![None, Some("milk"), Some("cereal")]),
    ) -> LineItem {
        let mut line = LineItem::new("", "Item", quantity, Money::from_cents(price))
            .with_crv(Money::from_cents(crv))
            .with_tax_rate(TaxRate::from_bps(bps));
        if snap {
            line = line.snap_eligible();
        }
        if let Some(category) = wic {
            line = line.wic_approved(category);
        }
        line
    }
}

fn arb_cart() -> impl Strategy<Value = Vec<LineItem>> {
    prop::collection::vec(arb_line(), 1..6).prop_map(|lines| {
        lines
            .into_iter()
            .enumerate()
            .map(|(index, mut line)| {
                line.id = format!("line-{index}");
                line
            })
            .collect()
    })
}

prop_compose! {
    fn arb_prescriptions()(milk in 0i64..4, cereal in 0i64..4) -> Vec<WicPrescription> {
        vec![
            WicPrescription::new("milk", milk),
            WicPrescription::new("cereal", cereal),
        ]
    }
}

fn started(lines: &[LineItem], prescriptions: &[WicPrescription]) -> PaymentOrchestrator {
    let mut engine = PaymentOrchestrator::new(EngineConfig::default());
    engine
        .begin_payment(lines.to_vec(), prescriptions)
        .expect("generated cart is valid");
    engine
}

/// Applies WIC, SNAP, then two regular tenders for whatever is left, and
/// returns the payments exactly as they were applied.
fn settle(
    lines: &[LineItem],
    prescriptions: &[WicPrescription],
    wic: i64,
    snap: i64,
) -> Vec<PaymentRequest> {
    let mut engine = started(lines, prescriptions);
    let mut applied = Vec::new();

    let request = PaymentRequest::wic(Money::from_cents(wic), prescriptions.to_vec());
    if let Ok(result) = engine.apply_payment(request) {
        if result.applied_amount.is_positive() {
            applied.push(PaymentRequest::wic(result.applied_amount, prescriptions.to_vec()));
        }
    }

    let request = PaymentRequest::new(TenderType::Snap, Money::from_cents(snap));
    if let Ok(result) = engine.apply_payment(request) {
        if result.applied_amount.is_positive() {
            applied.push(PaymentRequest::new(TenderType::Snap, result.applied_amount));
        }
    }

    let balance = engine.totals().balance_remaining.cents();
    let cash = balance / 2;
    let credit = balance - cash;
    if cash > 0 {
        applied.push(PaymentRequest::new(TenderType::Cash, Money::from_cents(cash)));
    }
    if credit > 0 {
        applied.push(PaymentRequest::new(TenderType::Credit, Money::from_cents(credit)));
    }
    applied
}

// ============================================================================
// Order Independence
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: any permutation of a settling payment multiset reaches the
    /// same lines and totals
    #[test]
    fn test_payment_order_does_not_change_outcome(
        lines in arb_cart(),
        prescriptions in arb_prescriptions(),
        wic in 1i64..3_000,
        snap in 1i64..3_000,
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
    ) {
        let payments = settle(&lines, &prescriptions, wic, snap);

        let mut canonical = started(&lines, &prescriptions);
        for payment in &payments {
            prop_assert!(canonical.apply_payment(payment.clone()).is_ok());
        }

        let mut shuffled = started(&lines, &prescriptions);
        for index in order.into_iter().filter(|&i| i < payments.len()) {
            let result = shuffled.apply_payment(payments[index].clone());
            prop_assert!(result.is_ok(), "payment {:?} failed: {:?}", payments[index], result);
            prop_assert_eq!(result.unwrap().applied_amount, payments[index].amount);
        }

        prop_assert_eq!(shuffled.lines(), canonical.lines());
        prop_assert_eq!(shuffled.totals(), canonical.totals());
        prop_assert!(shuffled.totals().is_paid());
    }
}

// ============================================================================
// Tax Consistency
// ============================================================================

proptest! {
    /// Property: tax on one multi-unit line equals the sum over single units
    #[test]
    fn test_split_sale_collects_same_tax(
        unit_cents in 1i64..5_000,
        crv in 0i64..20,
        bps in 0u32..1_500,
        quantity in 1i64..20,
    ) {
        let rate = TaxRate::from_bps(bps);
        let unit = Money::from_cents(unit_cents + crv);

        let combined = tax_for_taxable_amount(unit.multiply_quantity(quantity), quantity, rate);
        let single = tax_for_taxable_amount(unit, 1, rate);

        prop_assert_eq!(combined.per_unit, single.per_unit);
        prop_assert_eq!(combined.total, single.total.multiply_quantity(quantity));
    }

    /// Property: tax never exceeds the rate applied to the taxable amount plus
    /// half a cent per unit
    #[test]
    fn test_recalculated_tax_tracks_taxable_amount(
        line in arb_line(),
        snap_fraction in 0i64..=100,
    ) {
        let mut line = line.snap_eligible();
        let gross = line.gross_extended_price();
        line.snap_paid_amount = Money::from_cents(gross.cents() * snap_fraction / 100);
        let line = tender_core::recalc::recalculate_line(&line);

        prop_assert!(line.subject_to_tax_total <= gross);
        if snap_fraction == 100 {
            prop_assert_eq!(line.tax_total, Money::zero());
        }
        let exact = line.subject_to_tax_total.to_decimal() * line.tax_rate.percent()
            / rust_decimal::Decimal::ONE_HUNDRED;
        let slack = rust_decimal::Decimal::new(line.quantity, 2);
        prop_assert!(line.tax_total.to_decimal() <= exact + slack);
    }
}

// ============================================================================
// Conservation
// ============================================================================

fn arb_request() -> impl Strategy<Value = (usize, i64)> {
    (0usize..TenderType::ALL.len(), 1i64..2_500)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: every accepted payment splits into applied + unapplied +
    /// change, and lines never carry more than their gross
    #[test]
    fn test_money_is_conserved(
        lines in arb_cart(),
        prescriptions in arb_prescriptions(),
        requests in prop::collection::vec(arb_request(), 1..8),
    ) {
        let mut engine = started(&lines, &prescriptions);
        let mut applied_total = Money::zero();

        for (tender_index, cents) in requests {
            let tender = TenderType::ALL[tender_index];
            let request = PaymentRequest {
                tender,
                amount: Money::from_cents(cents),
                prescriptions: prescriptions.clone(),
            };
            let result = match engine.apply_payment(request) {
                Ok(result) => result,
                Err(err) => {
                    prop_assert!(
                        !matches!(err, EngineError::RoundingInvariantViolation { .. }),
                        "invariant broken: {}",
                        err
                    );
                    continue;
                }
            };

            prop_assert_eq!(
                result.requested,
                result.applied_amount + result.unapplied_remainder + result.change_due
            );
            applied_total += result.applied_amount;

            for line in engine.lines() {
                prop_assert!(line.merchandise_paid() <= line.gross_extended_price());
                prop_assert!(line.tax_paid_amount <= line.tax_total);
            }
            prop_assert!(!engine.totals().balance_remaining.is_negative());
        }

        let totals = engine.totals();
        prop_assert_eq!(totals.amount_paid, applied_total);
        if totals.is_paid() {
            prop_assert_eq!(totals.amount_paid, totals.grand_total);
        }
    }
}

// ============================================================================
// Void
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: apply then void restores the pre-payment lines and totals,
    /// and a second void changes nothing
    #[test]
    fn test_void_restores_previous_state(
        lines in arb_cart(),
        prescriptions in arb_prescriptions(),
        wic in 1i64..3_000,
        snap in 1i64..3_000,
        pick in 0usize..4,
    ) {
        let payments = settle(&lines, &prescriptions, wic, snap);
        prop_assume!(!payments.is_empty());
        let pick = pick % payments.len();

        let mut engine = started(&lines, &prescriptions);
        for (index, payment) in payments.iter().enumerate() {
            if index != pick {
                prop_assert!(engine.apply_payment(payment.clone()).is_ok());
            }
        }
        let before_lines = engine.lines().to_vec();
        let before_totals = engine.totals();

        let result = engine.apply_payment(payments[pick].clone());
        prop_assert!(result.is_ok());
        let id = result.unwrap().payment_id;
        prop_assert!(id.is_some());
        let id = id.unwrap();

        prop_assert!(engine.void_payment(id).is_ok());
        prop_assert_eq!(engine.lines(), before_lines.as_slice());
        prop_assert_eq!(engine.totals(), before_totals);

        prop_assert!(engine.void_payment(id).is_ok());
        prop_assert_eq!(engine.lines(), before_lines.as_slice());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: voiding any earlier payment leaves the lines and totals a
    /// fresh run without that payment reaches
    #[test]
    fn test_void_of_earlier_payment_matches_fresh_run(
        lines in arb_cart(),
        prescriptions in arb_prescriptions(),
        wic in 1i64..3_000,
        snap in 1i64..3_000,
        pick in 0usize..4,
    ) {
        let payments = settle(&lines, &prescriptions, wic, snap);
        prop_assume!(payments.len() > 1);
        let pick = pick % (payments.len() - 1);

        let mut engine = started(&lines, &prescriptions);
        let mut ids = Vec::new();
        for payment in &payments {
            let result = engine.apply_payment(payment.clone());
            prop_assert!(result.is_ok());
            ids.push(result.unwrap().payment_id);
        }
        prop_assert!(ids[pick].is_some());
        let voided = engine.void_payment(ids[pick].unwrap());
        prop_assert!(voided.is_ok());
        prop_assert!(voided.unwrap().voided);

        let mut fresh = started(&lines, &prescriptions);
        for (index, payment) in payments.iter().enumerate() {
            if index != pick {
                prop_assert!(fresh.apply_payment(payment.clone()).is_ok());
            }
        }

        prop_assert_eq!(engine.lines(), fresh.lines());
        prop_assert_eq!(engine.totals(), fresh.totals());
    }
}

// ============================================================================
// WIC Units
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Wic(i64),
    Snap(i64),
    /// Voids the n-th (mod count) still-active WIC payment.
    VoidWic(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1i64..1_500).prop_map(Op::Wic),
        1 => (1i64..1_500).prop_map(Op::Snap),
        2 => (0usize..8).prop_map(Op::VoidWic),
    ]
}

/// Units of `category` the lines' WIC-paid amounts cover.
fn covered_units(engine: &PaymentOrchestrator, category: &str) -> i64 {
    engine
        .lines()
        .iter()
        .filter(|line| line.wic_category.as_deref() == Some(category))
        .map(|line| line.wic_paid_amount.units_of(line.unit_price))
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: across WIC payments and voids, units taken off the card
    /// always equal the units the lines' WIC-paid amounts cover
    #[test]
    fn test_wic_units_track_line_amounts_across_voids(
        lines in arb_cart(),
        prescriptions in arb_prescriptions(),
        ops in prop::collection::vec(arb_op(), 1..10),
    ) {
        let mut engine = started(&lines, &prescriptions);
        let mut card = prescriptions.clone();
        let mut active = Vec::new();

        for op in ops {
            match op {
                Op::Wic(cents) => {
                    let request = PaymentRequest::wic(Money::from_cents(cents), card.clone());
                    if let Ok(result) = engine.apply_payment(request) {
                        if let Some(id) = result.payment_id {
                            card = result.prescriptions;
                            active.push(id);
                        }
                    }
                }
                Op::Snap(cents) => {
                    let _ = engine
                        .apply_payment(PaymentRequest::new(TenderType::Snap, Money::from_cents(cents)));
                }
                Op::VoidWic(n) => {
                    if active.is_empty() {
                        continue;
                    }
                    let id = active.remove(n % active.len());
                    let result = engine.void_payment(id);
                    prop_assert!(result.is_ok());
                    for release in result.unwrap().released_wic_units {
                        prop_assert!(release.units > 0);
                        let rx = card.iter_mut().find(|rx| rx.covers_category(&release.category));
                        prop_assert!(rx.is_some());
                        rx.unwrap().allowed_quantity_remaining += release.units;
                    }
                }
            }

            for (start, now) in prescriptions.iter().zip(&card) {
                prop_assert_eq!(
                    start.allowed_quantity_remaining - now.allowed_quantity_remaining,
                    covered_units(&engine, &start.category),
                    "category {}",
                    start.category
                );
            }
        }
    }
}
