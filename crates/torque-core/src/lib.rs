//! # torque-core: Pure Business Logic for Torque
//!
//! The rules of the Invoice–Inventory–Ledger engine as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Torque Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    torque-api (axum)                            │   │
//! │  │    /api/sales  /api/purchases  /api/inventory  /api/customers  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ typed commands                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               torque-db (transaction boundary)                  │   │
//! │  │    InvoiceService, StockLedger, BalanceLedger, reports          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plans, checks                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ torque-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  invoice  │  │ inventory │  │ validation│  │   │
//! │  │   │  Invoice  │  │ LedgerPlan│  │ StockLevel│  │   rules   │  │   │
//! │  │   │  Product  │  │ state mach│  │  reports  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Invoice, Product, Counterparty, journals)
//! - [`invoice`] - State machine guards and ledger delta plans
//! - [`inventory`] - Stock-level classification and report shapes
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use torque_core::{InvoiceLine, Money};
//!
//! let lines = vec![InvoiceLine::new("p1", 5, 1000)];
//! let total: Money = lines.iter().map(|l| l.line_total()).sum();
//! assert_eq!(total.cents(), 5000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod inventory;
pub mod invoice;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use inventory::{InventoryReport, InventorySummary, ReportFilter, StockLevel, StockReportRow};
pub use invoice::{BalanceDelta, LedgerPlan, LedgerPolicy, StockDelta};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single invoice.
pub const MAX_INVOICE_LINES: usize = 200;

/// Maximum quantity on a single invoice line.
///
/// Catches a mistyped quantity before it moves stock.
pub const MAX_LINE_QUANTITY: i64 = 100_000;
