//! # Error Types
//!
//! Domain-specific error types for tender-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  EngineError                 - what every public operation returns      │
//! │  ├── Allocation(..)          - surfaced to caller, never retried        │
//! │  │   ├── NoEligibleItems                                                │
//! │  │   ├── AlreadyPaid                                                    │
//! │  │   └── OverTender                                                     │
//! │  ├── Validation(..)          - bad input (quantities, amounts, ids)     │
//! │  └── RoundingInvariantViolation - allocator bug, FATAL, always logged   │
//! │                                                                         │
//! │  WicRejection                - per-line skip reason, NOT an error       │
//! │                                 unless it empties the eligible set      │
//! │                                                                         │
//! │  tender-checkout adds CheckoutError (terminal, collaborators, config)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (line id, tender, amounts)
//! 3. Errors are enum variants, never String

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::money::Money;
use crate::types::TenderType;

// =============================================================================
// Engine Error
// =============================================================================

/// Errors returned by the payment orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `begin_payment` was called after a payment was already accepted.
    ///
    /// ## When This Occurs
    /// ```text
    /// begin_payment(cart)  ──► apply_payment(SNAP $5) ──► begin_payment(cart)
    ///                                                          │
    ///                                                          ▼
    ///                                                   AlreadyStarted
    /// ```
    /// Eligibility is frozen for the whole payment phase.
    #[error("Payment already started: eligibility is frozen once a tender is accepted")]
    AlreadyStarted,

    /// A payment operation was attempted before `begin_payment`.
    #[error("Payment has not started: call begin_payment first")]
    NotStarted,

    /// `begin_payment` was given no line items.
    #[error("Transaction has no line items")]
    EmptyTransaction,

    /// The transaction already carries the maximum number of tenders.
    #[error("Transaction cannot have more than {max} tenders")]
    TooManyTenders { max: usize },

    /// No payment with this id exists on the transaction.
    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    /// An allocator produced a state that breaks a money invariant.
    ///
    /// This is a bug, not a user error. It is logged at error level where it
    /// is detected and must never be mapped to success.
    #[error("Rounding invariant violated on line {line_id}: {detail}")]
    RoundingInvariantViolation { line_id: String, detail: String },

    /// Allocation was refused.
    #[error("Allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Allocation Error
// =============================================================================

/// Allocation refusals surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// A WIC tender found no line that passes its prescriptions.
    #[error("No WIC-eligible items ({} line(s) rejected)", .rejected.len())]
    NoEligibleItems { rejected: Vec<IneligibleLine> },

    /// The balance is already zero.
    #[error("Transaction is already paid in full")]
    AlreadyPaid,

    /// A tender that cannot give change was offered more than the balance.
    #[error("{tender} cannot exceed the balance: offered {offered}, balance {balance}")]
    OverTender {
        tender: TenderType,
        offered: Money,
        balance: Money,
    },
}

// =============================================================================
// WIC Rejection
// =============================================================================

/// Why a WIC-approved line was skipped by a WIC tender.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum WicRejection {
    /// The line has no WIC category.
    #[error("line has no WIC category")]
    MissingCategory,

    /// The card carries no prescription for the category.
    #[error("no prescription for category {category}")]
    NoPrescription { category: String },

    /// The prescription's brand allow-list excludes the line's brand.
    #[error("brand {brand:?} not allowed for {category}")]
    BrandNotAllowed {
        category: String,
        brand: Option<String>,
    },

    /// The prescription's size allow-list excludes the line's size.
    #[error("size {size:?} not allowed for {category}")]
    SizeNotAllowed {
        category: String,
        size: Option<String>,
    },

    /// The prescription has no units left for the category.
    #[error("no {category} units remaining on prescription")]
    QuantityExhausted { category: String },
}

/// A line skipped by a WIC tender, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IneligibleLine {
    pub line_id: String,
    pub reason: WicRejection,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any allocation runs, so a failed validation never leaves
/// a partially applied state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate line id).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
