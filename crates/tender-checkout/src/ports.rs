//! # Collaborator Ports
//!
//! Traits for everything the checkout layer consumes but does not own.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProductCatalog          sku → price, CRV, tax rate, SNAP/WIC flags     │
//! │  WicCardService          card → prescriptions (read + write back)       │
//! │  PaymentTerminalGateway  charge / reverse for EBT-Cash, cards, checks   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations must be `Send + Sync`; the session holds them behind
//! `Arc<dyn ...>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tender_core::{Money, TaxRate, TenderType, WicPrescription};

use crate::error::CheckoutResult;

// =============================================================================
// Catalog
// =============================================================================

/// What the catalog knows about one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    #[serde(default)]
    pub crv_per_unit: Money,
    #[serde(default)]
    pub tax_rate: TaxRate,
    #[serde(default)]
    pub is_snap_eligible: bool,
    #[serde(default)]
    pub is_wic_approved: bool,
    #[serde(default)]
    pub wic_category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks a product up by SKU. `Ok(None)` when it does not exist.
    async fn product(&self, sku: &str) -> CheckoutResult<Option<CatalogEntry>>;
}

// =============================================================================
// WIC Card Service
// =============================================================================

#[async_trait]
pub trait WicCardService: Send + Sync {
    /// Current prescriptions on the card. Fetched once per WIC attempt.
    async fn prescriptions(&self, card_id: &str) -> CheckoutResult<Vec<WicPrescription>>;

    /// Writes back prescriptions after units were consumed or restored.
    async fn update_prescriptions(
        &self,
        card_id: &str,
        prescriptions: &[WicPrescription],
    ) -> CheckoutResult<()>;
}

// =============================================================================
// Payment Terminal
// =============================================================================

/// Failures reported by a payment terminal.
///
/// Passed to the caller unchanged; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalError {
    #[error("Terminal timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Terminal communication failed: {0}")]
    Communication(String),

    #[error("Terminal is unavailable")]
    Unavailable,
}

/// Terminal outcome for one charge or reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentResult {
    /// Approved for this amount (may be less than requested).
    Approved(Money),
    Declined(String),
    Error(TerminalError),
    Cancelled,
}

#[async_trait]
pub trait PaymentTerminalGateway: Send + Sync {
    /// Charges `amount` to the customer's instrument.
    async fn charge(&self, tender: TenderType, amount: Money) -> PaymentResult;

    /// Returns a previously approved `amount`.
    async fn reverse(&self, tender: TenderType, amount: Money) -> PaymentResult;
}

// =============================================================================
// Authorization
// =============================================================================

/// Whether the operator may perform a protected action (voids).
///
/// Computed by the permission layer; the checkout only reads it. Absent an
/// answer, a supervisor has to approve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Allowed,
    #[default]
    RequiresApproval,
    Denied,
}
