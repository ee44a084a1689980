//! # torque-db: Persistence Layer for Torque
//!
//! SQLite storage for the invoice engine through sqlx: the Stock Ledger,
//! the Balance Ledger, the Invoice Aggregate's transaction boundary and the
//! Inventory Report Service.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Torque Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales/{id}/complete)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     torque-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │    Services    │   │  Repositories  │   │   Database    │  │   │
//! │  │   │                │   │                │   │   (pool.rs)   │  │   │
//! │  │   │ InvoiceService │──►│ StockLedger    │──►│ SqlitePool    │  │   │
//! │  │   │ Inventory      │   │ BalanceLedger  │   │ busy_timeout  │  │   │
//! │  │   │ ReportService  │   │ Product / ...  │   │ migrations    │  │   │
//! │  │   └────────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                SQLite Database (WAL, torque.db)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, service accessors
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog, counterparties and the two ledgers
//! - [`service`] - Invoice Aggregate and inventory reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use torque_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("torque.db")).await?;
//!
//! let invoice = db.sales().create(header, lines, InvoiceStatus::Pending).await?;
//! db.sales().complete(&invoice.id).await?;
//!
//! let low = db.inventory_reports().low_stock(&ReportFilter::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::balance::BalanceLedger;
pub use repository::catalog::CatalogRepository;
pub use repository::counterparty::CounterpartyRepository;
pub use repository::product::ProductRepository;
pub use repository::stock::StockLedger;
pub use service::inventory::InventoryReportService;
pub use service::invoice::InvoiceService;
