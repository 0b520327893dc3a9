//! # tender-checkout: Checkout Integration for the Tender Engine
//!
//! Connects `tender-core` to the things a register actually talks to: the
//! product catalog, the WIC card service and the payment terminal.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout-sim (bin)            scenario JSON → report JSON              │
//! │         │                                                               │
//! │  ┌──────▼──────────────────────────────────────────────────────────┐   │
//! │  │ ★ tender-checkout (THIS CRATE) ★                                │   │
//! │  │   CheckoutSession ── Arc<Mutex<PaymentOrchestrator>>            │   │
//! │  │        │                                                        │   │
//! │  │        ├── ProductCatalog          (ports)                      │   │
//! │  │        ├── WicCardService          (ports)                      │   │
//! │  │        └── PaymentTerminalGateway  (ports)                      │   │
//! │  │   memory: in-process implementations of every port              │   │
//! │  └──────┬──────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │  tender-core                     pure allocation + tax                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod ports;
pub mod scenario;
pub mod session;

pub use config::CheckoutConfig;
pub use error::{CheckoutError, CheckoutResult};
pub use ports::{
    Authorization, CatalogEntry, PaymentResult, PaymentTerminalGateway, ProductCatalog,
    TerminalError, WicCardService,
};
pub use session::{CartEntry, CheckoutSession};

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Output goes to stderr.
/// Calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
