//! # Repository Module
//!
//! Database repository implementations for Torque.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Ledgers                             │
//! │                                                                         │
//! │  Record repositories (side-effect free CRUD)                           │
//! │  ├── ProductRepository       parts catalog                             │
//! │  ├── CatalogRepository       categories, stores                        │
//! │  └── CounterpartyRepository  customers, suppliers (never balances)     │
//! │                                                                         │
//! │  Ledgers (mutated only from inside an invoice transaction)             │
//! │  ├── StockLedger             (product, store) → quantity + movements   │
//! │  └── BalanceLedger           counterparty → balance + entries          │
//! │                                                                         │
//! │  Invoice rows                                                          │
//! │  └── invoice (crate-private) header + lines, read back into Invoice    │
//! │                                                                         │
//! │  Reads take the pool. Mutations that belong to an invoice transition   │
//! │  take `&mut SqliteConnection`, so callers pass `&mut *tx` and every    │
//! │  write lands in the caller's transaction.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod balance;
pub mod catalog;
pub mod counterparty;
pub(crate) mod invoice;
pub mod product;
pub mod stock;

/// Generates a new UUID v4 string id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
