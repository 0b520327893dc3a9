//! # Checkout Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Engine      │  │    Terminal     │  │     Collaborators       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Engine(..)     │  │  Terminal(..)   │  │  ProductNotFound        │ │
//! │  │                 │  │  Declined       │  │  WicService             │ │
//! │  │                 │  │  Cancelled      │  │  NoWicCard              │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │  Authorization  │  │              Configuration                  │  │
//! │  │                 │  │                                             │  │
//! │  │  ApprovalReq'd  │  │  InvalidConfig • ConfigLoadFailed           │  │
//! │  │  NotAuthorized  │  │  InvalidScenario                            │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use tender_core::{EngineError, TenderType};

use crate::ports::TerminalError;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Engine
    // =========================================================================
    /// The allocation engine refused the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    // =========================================================================
    // Terminal
    // =========================================================================
    /// The terminal failed; passed through unchanged.
    #[error("Terminal error: {0}")]
    Terminal(#[from] TerminalError),

    /// The customer's instrument was declined.
    #[error("{tender} declined: {reason}")]
    Declined { tender: TenderType, reason: String },

    /// The customer or cashier cancelled at the terminal.
    #[error("{tender} cancelled at the terminal")]
    Cancelled { tender: TenderType },

    // =========================================================================
    // Collaborators
    // =========================================================================
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("WIC card service error: {0}")]
    WicService(String),

    /// A WIC tender was offered but no WIC card was presented at begin.
    #[error("No WIC card presented for this transaction")]
    NoWicCard,

    // =========================================================================
    // Authorization
    // =========================================================================
    #[error("Manager approval required")]
    ApprovalRequired,

    #[error("Operator is not authorized for this action")]
    NotAuthorized,

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid checkout configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for CheckoutError {
    fn from(err: std::io::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CheckoutError {
    fn from(err: toml::de::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CheckoutError {
    fn from(err: toml::ser::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::InvalidScenario(err.to_string())
    }
}

impl From<tender_core::ValidationError> for CheckoutError {
    fn from(err: tender_core::ValidationError) -> Self {
        CheckoutError::InvalidConfig(err.to_string())
    }
}
