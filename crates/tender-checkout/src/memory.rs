//! # In-Memory Collaborators
//!
//! Thread-safe implementations of the ports for tests, demos and the
//! scenario simulator.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tender_core::{Money, TenderType, WicPrescription};

use crate::error::{CheckoutError, CheckoutResult};
use crate::ports::{
    CatalogEntry, PaymentResult, PaymentTerminalGateway, ProductCatalog, WicCardService,
};

// =============================================================================
// Catalog
// =============================================================================

/// Catalog keyed by SKU.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<String, CatalogEntry>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog holding `entries`.
    pub fn with_products(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let products = entries
            .into_iter()
            .map(|entry| (entry.sku.clone(), entry))
            .collect();
        InMemoryCatalog {
            products: Arc::new(RwLock::new(products)),
        }
    }

    pub async fn insert(&self, entry: CatalogEntry) {
        let mut products = self.products.write().await;
        products.insert(entry.sku.clone(), entry);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn product(&self, sku: &str) -> CheckoutResult<Option<CatalogEntry>> {
        let products = self.products.read().await;
        Ok(products.get(sku).cloned())
    }
}

// =============================================================================
// WIC Cards
// =============================================================================

/// WIC card service keyed by card id.
#[derive(Default, Clone)]
pub struct InMemoryWicCards {
    cards: Arc<RwLock<HashMap<String, Vec<WicPrescription>>>>,
}

impl InMemoryWicCards {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, card_id: impl Into<String>, prescriptions: Vec<WicPrescription>) {
        let mut cards = self.cards.write().await;
        cards.insert(card_id.into(), prescriptions);
    }
}

#[async_trait]
impl WicCardService for InMemoryWicCards {
    async fn prescriptions(&self, card_id: &str) -> CheckoutResult<Vec<WicPrescription>> {
        let cards = self.cards.read().await;
        cards
            .get(card_id)
            .cloned()
            .ok_or_else(|| CheckoutError::WicService(format!("unknown card {card_id}")))
    }

    async fn update_prescriptions(
        &self,
        card_id: &str,
        prescriptions: &[WicPrescription],
    ) -> CheckoutResult<()> {
        let mut cards = self.cards.write().await;
        match cards.get_mut(card_id) {
            Some(current) => {
                *current = prescriptions.to_vec();
                Ok(())
            }
            None => Err(CheckoutError::WicService(format!("unknown card {card_id}"))),
        }
    }
}

// =============================================================================
// Scripted Terminal
// =============================================================================

/// Terminal that replays queued outcomes.
///
/// With an empty queue every charge and reversal is approved in full.
#[derive(Default, Clone)]
pub struct ScriptedTerminal {
    charges: Arc<RwLock<VecDeque<PaymentResult>>>,
    reversals: Arc<RwLock<VecDeque<PaymentResult>>>,
    log: Arc<RwLock<Vec<TerminalCall>>>,
}

/// One call the terminal received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCall {
    pub reversal: bool,
    pub tender: TenderType,
    pub amount: Money,
}

impl ScriptedTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues outcomes for the next charges, in order.
    pub fn with_charges(outcomes: impl IntoIterator<Item = PaymentResult>) -> Self {
        ScriptedTerminal {
            charges: Arc::new(RwLock::new(outcomes.into_iter().collect())),
            ..Self::default()
        }
    }

    pub async fn push_charge(&self, outcome: PaymentResult) {
        self.charges.write().await.push_back(outcome);
    }

    pub async fn push_reversal(&self, outcome: PaymentResult) {
        self.reversals.write().await.push_back(outcome);
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<TerminalCall> {
        self.log.read().await.clone()
    }

    async fn next(
        &self,
        queue: &RwLock<VecDeque<PaymentResult>>,
        reversal: bool,
        tender: TenderType,
        amount: Money,
    ) -> PaymentResult {
        self.log.write().await.push(TerminalCall {
            reversal,
            tender,
            amount,
        });
        queue
            .write()
            .await
            .pop_front()
            .unwrap_or(PaymentResult::Approved(amount))
    }
}

#[async_trait]
impl PaymentTerminalGateway for ScriptedTerminal {
    async fn charge(&self, tender: TenderType, amount: Money) -> PaymentResult {
        self.next(&self.charges, false, tender, amount).await
    }

    async fn reverse(&self, tender: TenderType, amount: Money) -> PaymentResult {
        self.next(&self.reversals, true, tender, amount).await
    }
}
