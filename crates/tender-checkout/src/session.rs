//! # Checkout Session
//!
//! Drives one transaction's payment phase against real collaborators.
//!
//! ## Tender Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tender(type, amount)                                                   │
//! │                                                                         │
//! │   WIC ─────────► card service: prescriptions ─► engine ─► write back    │
//! │   SNAP, Cash ──► engine                                                 │
//! │   EBT-Cash,  ──► engine.preflight ─► terminal.charge ─┬─► Approved(x)   │
//! │   Credit,                                             │   engine(x)     │
//! │   Debit, Check                                        ├─► Declined      │
//! │                                                       ├─► Error         │
//! │                                                       └─► Cancelled     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The orchestrator sits behind one `tokio::sync::Mutex`, so a transaction
//! has exactly one writer even while a terminal call is in flight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tender_core::{
    AllocationResult, EngineConfig, EngineError, LineItem, Money, PaymentOrchestrator,
    PaymentRecord, PaymentRequest, TenderType, Totals, TransactionEligibility,
    TransactionSnapshot, VoidResult, WicUnitRelease,
};

use crate::error::{CheckoutError, CheckoutResult};
use crate::ports::{
    Authorization, CatalogEntry, PaymentResult, PaymentTerminalGateway, ProductCatalog,
    WicCardService,
};

/// One scanned product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub sku: String,
    pub quantity: i64,
    #[serde(default)]
    pub discount_per_unit: Money,
}

impl CartEntry {
    pub fn new(sku: impl Into<String>, quantity: i64) -> Self {
        CartEntry {
            sku: sku.into(),
            quantity,
            discount_per_unit: Money::zero(),
        }
    }
}

struct Transaction {
    engine: PaymentOrchestrator,
    wic_card: Option<String>,
}

/// Payment phase of one transaction at one terminal.
#[derive(Clone)]
pub struct CheckoutSession {
    state: Arc<Mutex<Transaction>>,
    catalog: Arc<dyn ProductCatalog>,
    wic_cards: Arc<dyn WicCardService>,
    terminal: Arc<dyn PaymentTerminalGateway>,
}

impl CheckoutSession {
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn ProductCatalog>,
        wic_cards: Arc<dyn WicCardService>,
        terminal: Arc<dyn PaymentTerminalGateway>,
    ) -> Self {
        CheckoutSession {
            state: Arc::new(Mutex::new(Transaction {
                engine: PaymentOrchestrator::new(config),
                wic_card: None,
            })),
            catalog,
            wic_cards,
            terminal,
        }
    }

    // =========================================================================
    // Begin
    // =========================================================================

    /// Prices the cart from the catalog and freezes eligibility.
    ///
    /// `wic_card` is the card presented at the start of payment, if any; its
    /// prescriptions decide which lines are WIC-eligible.
    pub async fn begin(
        &self,
        cart: &[CartEntry],
        wic_card: Option<&str>,
    ) -> CheckoutResult<TransactionEligibility> {
        let mut lines = Vec::with_capacity(cart.len());
        for (index, entry) in cart.iter().enumerate() {
            let product = self
                .catalog
                .product(&entry.sku)
                .await?
                .ok_or_else(|| CheckoutError::ProductNotFound(entry.sku.clone()))?;
            lines.push(line_from_catalog(index, &product, entry));
        }

        let prescriptions = match wic_card {
            Some(card) => self.wic_cards.prescriptions(card).await?,
            None => Vec::new(),
        };

        let mut state = self.state.lock().await;
        let eligibility = state.engine.begin_payment(lines, &prescriptions)?;
        state.wic_card = wic_card.map(str::to_string);

        info!(
            lines = cart.len(),
            wic_card = wic_card.is_some(),
            grand_total = %state.engine.totals().grand_total,
            "Checkout started"
        );
        Ok(eligibility)
    }

    /// Resumes a transaction from a snapshot.
    pub async fn resume(
        &self,
        snapshot: TransactionSnapshot,
        wic_card: Option<String>,
    ) -> CheckoutResult<()> {
        let mut state = self.state.lock().await;
        let config = state.engine.config().clone();
        state.engine = PaymentOrchestrator::restore(config, snapshot)?;
        state.wic_card = wic_card;
        info!(payments = state.engine.payments().len(), "Checkout resumed");
        Ok(())
    }

    // =========================================================================
    // Tender
    // =========================================================================

    /// Takes one tender.
    pub async fn tender(
        &self,
        tender: TenderType,
        amount: Money,
    ) -> CheckoutResult<AllocationResult> {
        let mut state = self.state.lock().await;
        match tender {
            TenderType::Wic => self.tender_wic(&mut state, amount).await,
            t if t.uses_terminal() => self.tender_terminal(&mut state, t, amount).await,
            _ => Ok(state
                .engine
                .apply_payment(PaymentRequest::new(tender, amount))?),
        }
    }

    async fn tender_wic(
        &self,
        state: &mut Transaction,
        amount: Money,
    ) -> CheckoutResult<AllocationResult> {
        let card = state.wic_card.clone().ok_or(CheckoutError::NoWicCard)?;
        let prescriptions = self.wic_cards.prescriptions(&card).await?;
        let result = state
            .engine
            .apply_payment(PaymentRequest::wic(amount, prescriptions))?;

        let Some(payment_id) = result.payment_id else {
            return Ok(result);
        };
        if let Err(err) = self
            .wic_cards
            .update_prescriptions(&card, &result.prescriptions)
            .await
        {
            error!(
                payment_id = %payment_id,
                error = %err,
                "WIC card update failed, backing out payment"
            );
            state.engine.void_payment(payment_id)?;
            return Err(err);
        }
        Ok(result)
    }

    async fn tender_terminal(
        &self,
        state: &mut Transaction,
        tender: TenderType,
        amount: Money,
    ) -> CheckoutResult<AllocationResult> {
        state
            .engine
            .preflight(&PaymentRequest::new(tender, amount))?;

        let approved = match self.terminal.charge(tender, amount).await {
            PaymentResult::Approved(approved) => approved,
            PaymentResult::Declined(reason) => {
                warn!(tender = %tender, amount = %amount, reason = %reason, "Tender declined");
                return Err(CheckoutError::Declined { tender, reason });
            }
            PaymentResult::Error(err) => {
                warn!(tender = %tender, amount = %amount, error = %err, "Terminal error");
                return Err(err.into());
            }
            PaymentResult::Cancelled => {
                info!(tender = %tender, amount = %amount, "Tender cancelled at terminal");
                return Err(CheckoutError::Cancelled { tender });
            }
        };

        if !approved.is_positive() {
            warn!(tender = %tender, "Terminal approved nothing");
            return Err(CheckoutError::Declined {
                tender,
                reason: format!("approved {approved}"),
            });
        }
        let approved = if approved > amount {
            warn!(tender = %tender, requested = %amount, approved = %approved, "Terminal approved more than requested");
            amount
        } else {
            approved
        };
        if approved < amount {
            info!(tender = %tender, requested = %amount, approved = %approved, "Partial approval");
        }

        match state
            .engine
            .apply_payment(PaymentRequest::new(tender, approved))
        {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(tender = %tender, approved = %approved, error = %err, "Approved charge was not applied, reversing");
                let reversal = self.terminal.reverse(tender, approved).await;
                if !matches!(reversal, PaymentResult::Approved(_)) {
                    error!(tender = %tender, approved = %approved, outcome = ?reversal, "Reversal failed");
                }
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Voids a payment.
    ///
    /// Terminal tenders are reversed on the terminal first. WIC voids hand back
    /// the units the engine reports as released, which is what the lines'
    /// WIC-paid amounts stop covering. A failed card write puts the payment
    /// back.
    pub async fn void(
        &self,
        payment_id: Uuid,
        authorization: Authorization,
    ) -> CheckoutResult<VoidResult> {
        match authorization {
            Authorization::Allowed => {}
            Authorization::RequiresApproval => return Err(CheckoutError::ApprovalRequired),
            Authorization::Denied => return Err(CheckoutError::NotAuthorized),
        }

        let mut state = self.state.lock().await;
        let record = state
            .engine
            .payment(payment_id)
            .cloned()
            .ok_or(EngineError::PaymentNotFound(payment_id))?;
        if !record.is_active() {
            debug!(payment_id = %payment_id, "Payment already voided");
            return Ok(state.engine.void_payment(payment_id)?);
        }

        if record.tender.uses_terminal() {
            match self.terminal.reverse(record.tender, record.applied).await {
                PaymentResult::Approved(_) => {}
                PaymentResult::Declined(reason) => {
                    warn!(payment_id = %payment_id, reason = %reason, "Reversal declined");
                    return Err(CheckoutError::Declined {
                        tender: record.tender,
                        reason,
                    });
                }
                PaymentResult::Error(err) => return Err(err.into()),
                PaymentResult::Cancelled => {
                    return Err(CheckoutError::Cancelled {
                        tender: record.tender,
                    })
                }
            }
        }

        let before = state.engine.clone();
        let outcome = state.engine.void_payment(payment_id)?;
        if outcome.released_wic_units.is_empty() {
            return Ok(outcome);
        }

        if let Err(err) = self.release_wic_units(&state, &outcome.released_wic_units).await {
            error!(
                payment_id = %payment_id,
                error = %err,
                "WIC card update failed, keeping payment"
            );
            state.engine = before;
            return Err(err);
        }
        Ok(outcome)
    }

    async fn release_wic_units(
        &self,
        state: &Transaction,
        released: &[WicUnitRelease],
    ) -> CheckoutResult<()> {
        let card = state.wic_card.clone().ok_or(CheckoutError::NoWicCard)?;
        let mut prescriptions = self.wic_cards.prescriptions(&card).await?;

        for release in released {
            if let Some(rx) = prescriptions
                .iter_mut()
                .find(|rx| rx.covers_category(&release.category))
            {
                rx.allowed_quantity_remaining += release.units;
            }
        }

        self.wic_cards
            .update_prescriptions(&card, &prescriptions)
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn totals(&self) -> Totals {
        self.state.lock().await.engine.totals()
    }

    pub async fn payments(&self) -> Vec<PaymentRecord> {
        self.state.lock().await.engine.payments().to_vec()
    }

    pub async fn lines(&self) -> Vec<LineItem> {
        self.state.lock().await.engine.lines().to_vec()
    }

    pub async fn snapshot(&self) -> TransactionSnapshot {
        self.state.lock().await.engine.snapshot()
    }
}

fn line_from_catalog(index: usize, product: &CatalogEntry, entry: &CartEntry) -> LineItem {
    let mut line = LineItem::new(
        (index + 1).to_string(),
        product.name.clone(),
        entry.quantity,
        product.unit_price,
    )
    .with_discount(entry.discount_per_unit)
    .with_crv(product.crv_per_unit)
    .with_tax_rate(product.tax_rate);

    if product.is_snap_eligible {
        line = line.snap_eligible();
    }
    if product.is_wic_approved {
        line = match &product.wic_category {
            Some(category) => line.wic_approved(category.clone()),
            // Rejected by validation at begin
            None => LineItem {
                is_wic_approved: true,
                ..line
            },
        };
    }
    if let Some(brand) = &product.brand {
        line = line.with_brand(brand.clone());
    }
    if let Some(size) = &product.size {
        line = line.with_size(size.clone());
    }
    line
}
