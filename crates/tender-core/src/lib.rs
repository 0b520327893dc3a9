//! # tender-core: Split-Tender Allocation for Retail Checkout
//!
//! Deterministic allocation of WIC, SNAP, EBT-Cash, Cash, Credit, Debit and
//! Check payments across a transaction's line items, with tax re-derived on
//! every line a tax-exempt tender touches.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                tender-checkout (integration)                    │   │
//! │  │   ProductCatalog • WicCardService • PaymentTerminalGateway      │   │
//! │  │   CheckoutSession (one writer per transaction)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ PaymentRequest / AllocationResult      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tender-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐  ┌───────────┐  ┌──────────────────────────┐ │   │
//! │  │   │ eligibility │  │    tax    │  │ allocation               │ │   │
//! │  │   │  (frozen)   │  │  recalc   │  │  snap • wic • regular    │ │   │
//! │  │   └─────────────┘  └───────────┘  └──────────────────────────┘ │   │
//! │  │                 orchestrator (ledger + invariants)              │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ASYNC • NO LOCKING • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` (cents) and `UnitAmount` (4 places), HALF_UP rounding
//! - [`types`] - Line items, tax rates, tenders, WIC prescriptions, requests
//! - [`error`] - Engine, allocation and validation errors
//! - [`validation`] - Input checks run before anything is allocated
//! - [`config`] - Orchestrator settings
//! - [`tax`] - Per-unit tax math
//! - [`eligibility`] - Frozen WIC/SNAP eligibility per line
//! - [`recalc`] - Tax re-derivation from benefit-paid amounts
//! - [`allocation`] - SNAP, WIC and regular allocators
//! - [`orchestrator`] - Payment phase of one transaction
//!
//! ## Design Principles
//!
//! 1. **Order Independence**: the same multiset of payments reaches the same
//!    state whatever order it arrives in
//! 2. **Immutable Snapshots**: allocators return new line collections
//! 3. **Integer Money**: cents in `i64`; only tax and per-unit bases pass
//!    through `Decimal`, and they round the moment they are produced
//! 4. **Explicit Errors**: typed errors, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use tender_core::{
//!     EngineConfig, LineItem, Money, PaymentOrchestrator, PaymentRequest, TaxRate, TenderType,
//! };
//!
//! let rate = TaxRate::from_percent(dec!(9.5));
//! let lines = vec![
//!     LineItem::new("1", "Bread", 1, Money::from_cents(350)).snap_eligible(),
//!     LineItem::new("2", "Soda", 1, Money::from_cents(259))
//!         .with_tax_rate(rate)
//!         .snap_eligible(),
//! ];
//!
//! let mut engine = PaymentOrchestrator::new(EngineConfig::default());
//! engine.begin_payment(lines, &[])?;
//! assert_eq!(engine.totals().grand_total.cents(), 634);
//!
//! // SNAP covers the taxable soda first, removing its $0.25 tax
//! let snap = engine.apply_payment(PaymentRequest::new(TenderType::Snap, Money::from_cents(600)))?;
//! assert_eq!(snap.totals.tax_saved.cents(), 25);
//! assert_eq!(snap.totals.balance_remaining.cents(), 9);
//!
//! let cash = engine.apply_payment(PaymentRequest::new(TenderType::Cash, Money::from_cents(100)))?;
//! assert_eq!(cash.change_due.cents(), 91);
//! assert!(engine.totals().is_paid());
//! # Ok::<(), tender_core::EngineError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod money;
pub mod orchestrator;
pub mod recalc;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::LineAllocation;
pub use config::EngineConfig;
pub use eligibility::{LineEligibility, TransactionEligibility};
pub use error::{
    AllocationError, EngineError, EngineResult, IneligibleLine, ValidationError, WicRejection,
};
pub use money::{Money, UnitAmount};
pub use orchestrator::{
    AllocationResult, PaymentOrchestrator, PaymentRecord, PaymentStatus, Totals,
    TransactionSnapshot, VoidResult, WicUnitRelease,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in one transaction.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity on one line.
///
/// ## Business Reason
/// Catches keying errors (1000 typed for 10) before any tender is taken.
pub const MAX_ITEM_QUANTITY: i64 = 999;
