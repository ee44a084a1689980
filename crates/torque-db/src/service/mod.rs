//! # Services
//!
//! Operations that span several tables inside one transaction.
//!
//! - [`invoice::InvoiceService`] - the Invoice Aggregate: state machine,
//!   ledger application, conflict retry
//! - [`inventory::InventoryReportService`] - read-only stock snapshots

pub mod inventory;
pub mod invoice;
