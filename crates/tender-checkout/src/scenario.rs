//! # Scripted Checkout Scenarios
//!
//! A JSON description of a cart, a WIC card, scripted terminal outcomes and
//! a list of tender/void steps, replayed against in-memory collaborators.
//!
//! ```json
//! {
//!   "products": [{ "sku": "SODA", "name": "Soda", "unit_price": 269,
//!                  "tax_rate": "9.5", "is_snap_eligible": true }],
//!   "cart": [{ "sku": "SODA", "quantity": 1 }],
//!   "terminal": [{ "declined": "insufficient funds" }],
//!   "steps": [
//!     { "action": "tender", "tender": "snap", "amount": 200 },
//!     { "action": "tender", "tender": "credit", "amount": 69 },
//!     { "action": "void", "step": 0, "authorization": "allowed" }
//!   ]
//! }
//! ```
//!
//! A failed step is recorded in the report and the run continues.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use tender_core::{
    AllocationResult, Money, TenderType, Totals, TransactionSnapshot, VoidResult,
    WicPrescription,
};

use crate::config::CheckoutConfig;
use crate::error::CheckoutResult;
use crate::memory::{InMemoryCatalog, InMemoryWicCards, ScriptedTerminal};
use crate::ports::{Authorization, CatalogEntry, PaymentResult, WicCardService};
use crate::session::{CartEntry, CheckoutSession};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub products: Vec<CatalogEntry>,
    pub cart: Vec<CartEntry>,
    #[serde(default)]
    pub wic_card: Option<WicCard>,
    /// Terminal outcomes for successive charges; approved in full once empty.
    #[serde(default)]
    pub terminal: Vec<PaymentResult>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WicCard {
    pub id: String,
    pub prescriptions: Vec<WicPrescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Tender { tender: TenderType, amount: Money },
    /// Voids the payment taken by an earlier step (zero-based). Without an
    /// explicit `authorization` the void waits for approval and is refused.
    Void {
        step: usize,
        #[serde(default)]
        authorization: Authorization,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub action: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AllocationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub void: Option<VoidResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub terminal_id: String,
    pub steps: Vec<StepOutcome>,
    pub totals: Totals,
    /// Card prescriptions after the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescriptions: Option<Vec<WicPrescription>>,
    pub snapshot: TransactionSnapshot,
}

/// Replays a scenario. Fails only if the cart cannot be started.
pub async fn run(scenario: Scenario, config: &CheckoutConfig) -> CheckoutResult<ScenarioReport> {
    let cards = InMemoryWicCards::new();
    if let Some(card) = &scenario.wic_card {
        cards.issue(card.id.clone(), card.prescriptions.clone()).await;
    }
    let session = CheckoutSession::new(
        config.engine.clone(),
        Arc::new(InMemoryCatalog::with_products(scenario.products)),
        Arc::new(cards.clone()),
        Arc::new(ScriptedTerminal::with_charges(scenario.terminal)),
    );

    let card_id = scenario.wic_card.as_ref().map(|card| card.id.as_str());
    session.begin(&scenario.cart, card_id).await?;

    let mut payment_ids: Vec<Option<Uuid>> = Vec::with_capacity(scenario.steps.len());
    let mut outcomes = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let (payment_id, outcome) = match step {
            Step::Tender { tender, amount } => match session.tender(*tender, *amount).await {
                Ok(result) => (result.payment_id, Ok((Some(result), None))),
                Err(err) => (None, Err(err.to_string())),
            },
            Step::Void {
                step: target,
                authorization,
            } => match payment_ids.get(*target).copied().flatten() {
                Some(id) => (
                    None,
                    session
                        .void(id, *authorization)
                        .await
                        .map(|voided| (None, Some(voided)))
                        .map_err(|err| err.to_string()),
                ),
                None => (None, Err(format!("step {target} took no payment"))),
            },
        };
        payment_ids.push(payment_id);

        let (result, void, error) = match outcome {
            Ok((result, void)) => (result, void, None),
            Err(err) => {
                warn!(step = index, error = %err, "Scenario step failed");
                (None, None, Some(err))
            }
        };
        outcomes.push(StepOutcome {
            step: index,
            action: step.clone(),
            result,
            void,
            error,
        });
    }

    let prescriptions = match card_id {
        Some(id) => Some(cards.prescriptions(id).await?),
        None => None,
    };
    let totals = session.totals().await;
    info!(
        steps = outcomes.len(),
        paid = totals.is_paid(),
        balance = %totals.balance_remaining,
        "Scenario finished"
    );

    Ok(ScenarioReport {
        terminal_id: config.terminal.id.clone(),
        steps: outcomes,
        totals,
        prescriptions,
        snapshot: session.snapshot().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROCERY: &str = include_str!("../../../demos/grocery.json");

    #[tokio::test]
    async fn test_grocery_demo_settles() {
        let scenario: Scenario = serde_json::from_str(GROCERY).unwrap();
        let report = run(scenario, &CheckoutConfig::default()).await.unwrap();

        assert!(report.totals.is_paid());
        assert_eq!(report.totals.grand_total.cents(), 2252);
        assert_eq!(report.totals.tax_saved.cents(), 64);

        // SNAP was offered $10.00 and applied $6.68
        let snap = report.steps[1].result.as_ref().unwrap();
        assert_eq!(snap.applied_amount.cents(), 668);
        assert_eq!(snap.unapplied_remainder.cents(), 332);

        // The first card was declined, the debit retry went through
        assert!(!report.steps[2].is_ok());
        assert!(report.steps[3].is_ok());

        let card = report.prescriptions.unwrap();
        assert!(card.iter().all(|rx| rx.allowed_quantity_remaining == 0));
    }

    #[tokio::test]
    async fn test_void_step_references_earlier_payment() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "products": [{ "sku": "BREAD", "name": "Bread", "unit_price": 350,
                           "is_snap_eligible": true }],
            "cart": [{ "sku": "BREAD", "quantity": 2 }],
            "steps": [
                { "action": "tender", "tender": "snap", "amount": 300 },
                { "action": "void", "step": 0, "authorization": "requires_approval" },
                { "action": "void", "step": 0, "authorization": "allowed" },
                { "action": "void", "step": 7, "authorization": "allowed" }
            ]
        }))
        .unwrap();

        let report = run(scenario, &CheckoutConfig::default()).await.unwrap();
        assert!(report.steps[0].is_ok());
        assert!(!report.steps[1].is_ok());
        assert!(report.steps[2].is_ok());
        assert!(!report.steps[3].is_ok());
        assert!(report.steps[2].void.as_ref().unwrap().voided);
        assert_eq!(report.totals.balance_remaining.cents(), 700);
        assert!(report.prescriptions.is_none());
    }

    #[tokio::test]
    async fn test_void_step_without_authorization_is_refused() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "products": [{ "sku": "BREAD", "name": "Bread", "unit_price": 350,
                           "is_snap_eligible": true }],
            "cart": [{ "sku": "BREAD", "quantity": 1 }],
            "steps": [
                { "action": "tender", "tender": "cash", "amount": 350 },
                { "action": "void", "step": 0 }
            ]
        }))
        .unwrap();
        assert_eq!(
            scenario.steps[1],
            Step::Void {
                step: 0,
                authorization: Authorization::RequiresApproval,
            }
        );

        let report = run(scenario, &CheckoutConfig::default()).await.unwrap();
        assert!(!report.steps[1].is_ok());
        assert!(report.steps[1].void.is_none());
        assert!(report.totals.is_paid());
    }

    #[tokio::test]
    async fn test_wic_void_step_reports_released_units() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "products": [{ "sku": "MILK", "name": "Milk", "unit_price": 429,
                           "is_snap_eligible": true, "is_wic_approved": true,
                           "wic_category": "milk" }],
            "cart": [{ "sku": "MILK", "quantity": 1 }],
            "wic_card": { "id": "card-9",
                          "prescriptions": [{ "category": "milk", "allowed_quantity_remaining": 1 }] },
            "steps": [
                { "action": "tender", "tender": "wic", "amount": 429 },
                { "action": "void", "step": 0, "authorization": "allowed" }
            ]
        }))
        .unwrap();

        let report = run(scenario, &CheckoutConfig::default()).await.unwrap();
        let void = report.steps[1].void.as_ref().unwrap();
        assert_eq!(void.released_wic_units.len(), 1);
        assert_eq!(void.released_wic_units[0].units, 1);
        let card = report.prescriptions.unwrap();
        assert_eq!(card[0].allowed_quantity_remaining, 1);
    }

    #[tokio::test]
    async fn test_unknown_product_fails_the_run() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "products": [],
            "cart": [{ "sku": "GHOST", "quantity": 1 }],
            "steps": []
        }))
        .unwrap();
        assert!(run(scenario, &CheckoutConfig::default()).await.is_err());
    }
}
