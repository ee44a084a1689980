//! # Domain Types
//!
//! Core domain types used throughout Torque.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Invoice      │   │  Counterparty   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, sku        │   │  id, code       │   │  id, kind       │       │
//! │  │  reorder_level  │   │  direction      │   │  balance_cents  │       │
//! │  │  allow_backorder│   │  status, lines  │   │  is_active      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockEntry    │   │  StockMovement  │   │  BalanceEntry   │       │
//! │  │  (product,store)│   │  journal of     │   │  journal of     │       │
//! │  │  → quantity     │   │  stock deltas   │   │  balance deltas │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Enums travel SCREAMING_SNAKE_CASE on the wire (`"PENDING"`) and are
//! stored snake_case in SQLite (`'pending'`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Invoice Direction
// =============================================================================

/// Which side of the business an invoice sits on.
///
/// Sales and purchases share one aggregate; the direction decides the sign
/// of the stock delta and which kind of counterparty the invoice names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceDirection {
    /// Goods leave a store, a customer is billed.
    Sale,
    /// Goods arrive at a store, a supplier bills us.
    Purchase,
}

impl InvoiceDirection {
    /// Sign applied to line quantities when the invoice completes.
    #[inline]
    pub const fn stock_sign(&self) -> i64 {
        match self {
            InvoiceDirection::Sale => -1,
            InvoiceDirection::Purchase => 1,
        }
    }

    /// The kind of counterparty this direction deals with.
    #[inline]
    pub const fn counterparty_kind(&self) -> CounterpartyKind {
        match self {
            InvoiceDirection::Sale => CounterpartyKind::Customer,
            InvoiceDirection::Purchase => CounterpartyKind::Supplier,
        }
    }

    /// Prefix for generated invoice codes.
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            InvoiceDirection::Sale => "SAL",
            InvoiceDirection::Purchase => "PUR",
        }
    }

    /// Journal reason for stock moved by a completion in this direction.
    pub const fn completion_reason(&self) -> MovementReason {
        match self {
            InvoiceDirection::Sale => MovementReason::SaleCompleted,
            InvoiceDirection::Purchase => MovementReason::PurchaseCompleted,
        }
    }

    /// Journal reason for stock moved back by a cancellation.
    pub const fn cancellation_reason(&self) -> MovementReason {
        match self {
            InvoiceDirection::Sale => MovementReason::SaleCancelled,
            InvoiceDirection::Purchase => MovementReason::PurchaseCancelled,
        }
    }

    /// Human label used in error messages ("Sale invoice").
    pub const fn label(&self) -> &'static str {
        match self {
            InvoiceDirection::Sale => "Sale invoice",
            InvoiceDirection::Purchase => "Purchase invoice",
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// The status of an invoice.
///
/// ## State Machine
/// ```text
///            complete              cancel
///  PENDING ───────────► COMPLETED ─────────► CANCELLED
///     │                                         ▲
///     └─────────────────────────────────────────┘
///                       cancel
///
///  Stock and balance effects exist iff status == COMPLETED.
///  CANCELLED is terminal.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Editable, no ledger effects applied.
    Pending,
    /// Ledger effects applied.
    Completed,
    /// Terminal. Any ledger effects have been reversed.
    Cancelled,
}

impl InvoiceStatus {
    /// Whether `self → next` is one of the three legal edges.
    pub const fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Pending, InvoiceStatus::Completed)
                | (InvoiceStatus::Completed, InvoiceStatus::Cancelled)
                | (InvoiceStatus::Pending, InvoiceStatus::Cancelled)
        )
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Cancelled)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Completed => "COMPLETED",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Pending
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale Type / Payment
// =============================================================================

/// Sale invoice flavour. Purchases carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleType {
    /// Counter sale to a walk-in or account customer.
    Regular,
    /// Transfer-priced sale to a branch.
    Branch,
}

impl Default for SaleType {
    fn default() -> Self {
        SaleType::Regular
    }
}

/// Whether the invoice is settled on the spot or deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Settled at completion, no balance effect.
    Cash,
    /// Deferred, the total lands on the counterparty balance.
    Credit,
}

impl PaymentType {
    #[inline]
    pub const fn is_credit(&self) -> bool {
        matches!(self, PaymentType::Credit)
    }
}

/// How money changes hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Bank,
    Check,
}

// =============================================================================
// Counterparty
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterpartyKind {
    Customer,
    Supplier,
}

impl CounterpartyKind {
    /// Human label used in error messages.
    pub const fn label(&self) -> &'static str {
        match self {
            CounterpartyKind::Customer => "Customer",
            CounterpartyKind::Supplier => "Supplier",
        }
    }
}

/// A customer (sale side) or supplier (purchase side).
///
/// `balance_cents` is positive when the customer owes the business, or when
/// the business owes the supplier. It is only ever changed by the Balance
/// Ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Counterparty {
    pub id: String,
    pub kind: CounterpartyKind,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub balance_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Counterparty {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// Input for creating or editing a counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CounterpartyDetails {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// An auto part in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Part number - business identifier.
    pub sku: String,

    pub name: String,

    pub category_id: Option<String>,

    /// List price in cents.
    pub price_cents: i64,

    /// Last purchase cost in cents.
    pub cost_cents: Option<i64>,

    /// At or below this quantity (and above zero) the part is low on stock.
    pub reorder_level: i64,

    /// Lets sales drive this part's stock below zero.
    pub allow_backorder: bool,

    /// Soft-delete flag.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Input for adding a part to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub reorder_level: i64,
    #[serde(default)]
    pub allow_backorder: bool,
}

// =============================================================================
// Stock
// =============================================================================

/// Quantity on hand for one (product, store) cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockEntry {
    pub product_id: String,
    pub store_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    SaleCompleted,
    SaleCancelled,
    PurchaseCompleted,
    PurchaseCancelled,
}

impl MovementReason {
    /// Whether this movement was written when an invoice completed.
    pub const fn is_completion(&self) -> bool {
        matches!(
            self,
            MovementReason::SaleCompleted | MovementReason::PurchaseCompleted
        )
    }
}

/// One applied stock delta, journaled in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub store_id: String,
    pub invoice_id: String,
    pub delta: i64,
    pub reason: MovementReason,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Balance Journal
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceEntryType {
    /// Credit invoice completed: `+total`.
    InvoiceCredit,
    /// Credit invoice cancelled: `−total`.
    InvoiceReversal,
    /// Payment recorded: `−amount`.
    Payment,
}

/// One applied balance delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BalanceEntry {
    pub id: String,
    pub counterparty_id: String,
    pub invoice_id: Option<String>,
    pub entry_type: BalanceEntryType,
    pub delta_cents: i64,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A payment handed to the Balance Ledger by the payments collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRecord {
    pub counterparty_id: String,
    pub kind: CounterpartyKind,
    /// Positive amount received (customer) or paid out (supplier).
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

// =============================================================================
// Invoice
// =============================================================================

/// One invoice line. Lines are ordered; position is `line_no` in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl InvoiceLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        InvoiceLine {
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// `quantity × unit_price`.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// Header fields a caller supplies on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceHeader {
    /// Business code; generated when absent.
    #[serde(default)]
    pub code: Option<String>,
    pub counterparty_id: String,
    pub store_id: String,
    /// Sales only. Defaults to `REGULAR`.
    #[serde(default)]
    pub sale_type: Option<SaleType>,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Typed invoice-creation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub header: InvoiceHeader,
    pub lines: Vec<InvoiceLine>,
    /// `PENDING` (default) or `COMPLETED`.
    #[serde(default)]
    pub initial_status: InvoiceStatus,
}

/// Edit of a PENDING invoice. Absent parts stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceUpdate {
    #[serde(default)]
    pub header: Option<InvoiceHeader>,
    #[serde(default)]
    pub lines: Option<Vec<InvoiceLine>>,
}

/// A sale or purchase invoice with its lines.
///
/// There is no stored total: [`Invoice::computed_total`] derives it from the
/// lines every time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub code: String,
    pub direction: InvoiceDirection,
    pub counterparty_id: String,
    pub store_id: String,
    pub sale_type: Option<SaleType>,
    pub status: InvoiceStatus,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub lines: Vec<InvoiceLine>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// List-view row: header plus SQL-derived total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceSummary {
    pub id: String,
    pub code: String,
    pub direction: InvoiceDirection,
    pub counterparty_id: String,
    pub counterparty_name: String,
    pub store_id: String,
    pub status: InvoiceStatus,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub line_count: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counts for one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceStats {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub cancelled: i64,
    /// Σ totals of COMPLETED invoices.
    pub completed_total_cents: i64,
    /// Σ totals of COMPLETED credit invoices.
    pub credit_total_cents: i64,
}

/// Filter for invoice list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceFilter {
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_limit() -> u32 {
    50
}

impl Default for InvoiceFilter {
    fn default() -> Self {
        InvoiceFilter {
            status: None,
            limit: default_page_limit(),
            offset: 0,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
