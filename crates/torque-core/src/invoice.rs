//! # Invoice Aggregate Rules
//!
//! Pure rules for the invoice state machine and the ledger deltas attached
//! to its two side-effecting edges.
//!
//! ## Where Ledger Effects Happen
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► PENDING ── update / delete (no ledger effect)            │
//! │                 │                                                       │
//! │                 │ complete:  plan = completion_plan()                   │
//! │                 │            stock   Σ sign × qty per (product, store) │
//! │                 │            balance +total if CREDIT                   │
//! │                 ▼                                                       │
//! │             COMPLETED                                                   │
//! │                 │                                                       │
//! │                 │ cancel:    plan = journal(invoice).inverse()          │
//! │                 ▼                                                       │
//! │             CANCELLED  (terminal)                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module only *plans*. Applying a plan atomically is the job of the
//! invoice service in torque-db, which owns the transaction.
//!
//! ## Example
//! ```rust
//! use torque_core::invoice::LedgerPlan;
//! # use torque_core::types::*;
//! # use chrono::Utc;
//! # let invoice = Invoice {
//! #     id: "i1".into(), code: "SAL-1".into(), direction: InvoiceDirection::Sale,
//! #     counterparty_id: "c1".into(), store_id: "s1".into(),
//! #     sale_type: Some(SaleType::Regular), status: InvoiceStatus::Pending,
//! #     payment_type: PaymentType::Credit, payment_method: PaymentMethod::Cash,
//! #     notes: None, lines: vec![InvoiceLine::new("p1", 5, 10)],
//! #     created_at: Utc::now(), updated_at: Utc::now(),
//! #     completed_at: None, cancelled_at: None,
//! # };
//! let plan = invoice.completion_plan();
//! assert_eq!(plan.stock[0].delta, -5);
//! assert_eq!(plan.balance.as_ref().map(|b| b.delta.cents()), Some(50));
//!
//! let undo: LedgerPlan = plan.inverse();
//! assert_eq!(undo.stock[0].delta, 5);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    BalanceEntry, BalanceEntryType, CounterpartyKind, Invoice, InvoiceDirection, InvoiceStatus,
    StockMovement,
};

// =============================================================================
// Ledger Deltas
// =============================================================================

/// A signed change to one (product, store) stock cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: String,
    pub store_id: String,
    pub delta: i64,
}

/// A signed change to one counterparty balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub counterparty_id: String,
    pub kind: CounterpartyKind,
    pub delta: Money,
}

/// Every ledger delta one invoice transition applies.
///
/// Stock deltas are sorted by product id and never contain two entries for
/// the same cell, so an invoice with two lines for the same part is checked
/// against its combined quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPlan {
    pub stock: Vec<StockDelta>,
    pub balance: Option<BalanceDelta>,
}

impl LedgerPlan {
    /// The plan that exactly undoes `self`.
    pub fn inverse(&self) -> LedgerPlan {
        LedgerPlan {
            stock: self
                .stock
                .iter()
                .map(|d| StockDelta {
                    product_id: d.product_id.clone(),
                    store_id: d.store_id.clone(),
                    delta: -d.delta,
                })
                .collect(),
            balance: self.balance.as_ref().map(|b| BalanceDelta {
                counterparty_id: b.counterparty_id.clone(),
                kind: b.kind,
                delta: -b.delta,
            }),
        }
    }

    /// Rebuilds the plan that was applied when an invoice completed, from
    /// the journal rows written at that time.
    ///
    /// Only completion movements and `INVOICE_CREDIT` entries count; a
    /// journal for an invoice that never completed yields an empty plan.
    pub fn from_journal(
        kind: CounterpartyKind,
        movements: &[StockMovement],
        entries: &[BalanceEntry],
    ) -> LedgerPlan {
        let mut cells: BTreeMap<(String, String), i64> = BTreeMap::new();
        for m in movements.iter().filter(|m| m.reason.is_completion()) {
            *cells
                .entry((m.product_id.clone(), m.store_id.clone()))
                .or_insert(0) += m.delta;
        }

        let credit = entries
            .iter()
            .filter(|e| e.entry_type == BalanceEntryType::InvoiceCredit)
            .fold(None::<BalanceDelta>, |acc, e| match acc {
                Some(mut b) => {
                    b.delta += Money::from_cents(e.delta_cents);
                    Some(b)
                }
                None => Some(BalanceDelta {
                    counterparty_id: e.counterparty_id.clone(),
                    kind,
                    delta: Money::from_cents(e.delta_cents),
                }),
            });

        LedgerPlan {
            stock: cells
                .into_iter()
                .filter(|(_, delta)| *delta != 0)
                .map(|((product_id, store_id), delta)| StockDelta {
                    product_id,
                    store_id,
                    delta,
                })
                .collect(),
            balance: credit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty() && self.balance.is_none()
    }
}

// =============================================================================
// Ledger Policy
// =============================================================================

/// Global ledger switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Backorder override for every product. Off by default.
    pub allow_backorder: bool,
}

impl LedgerPolicy {
    /// Whether a cell for a product with the given flag may go negative.
    #[inline]
    pub fn permits_negative(&self, product_allows_backorder: bool) -> bool {
        self.allow_backorder || product_allows_backorder
    }
}

// =============================================================================
// Invoice Rules
// =============================================================================

impl Invoice {
    /// Σ quantity × unit price over the lines. Never stored.
    pub fn computed_total(&self) -> Money {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    /// The deltas applying on PENDING → COMPLETED.
    ///
    /// ```text
    /// sale:      stock −qty   balance +total (CREDIT only, customer owes)
    /// purchase:  stock +qty   balance +total (CREDIT only, we owe supplier)
    /// ```
    pub fn completion_plan(&self) -> LedgerPlan {
        let sign = self.direction.stock_sign();

        let mut per_product: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &self.lines {
            *per_product.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
        }

        let stock = per_product
            .into_iter()
            .map(|(product_id, qty)| StockDelta {
                product_id: product_id.to_string(),
                store_id: self.store_id.clone(),
                delta: sign * qty,
            })
            .collect();

        let balance = self.payment_type.is_credit().then(|| BalanceDelta {
            counterparty_id: self.counterparty_id.clone(),
            kind: self.direction.counterparty_kind(),
            delta: self.computed_total(),
        });

        LedgerPlan { stock, balance }
    }

    /// Fails with `InvalidState` unless `status → next` is a legal edge.
    pub fn ensure_transition(&self, next: InvoiceStatus) -> CoreResult<()> {
        if self.status.can_transition_to(next) {
            return Ok(());
        }
        let operation = match next {
            InvoiceStatus::Completed => "complete",
            InvoiceStatus::Cancelled => "cancel",
            InvoiceStatus::Pending => "reopen",
        };
        Err(self.invalid_state(operation))
    }

    /// Header and lines may only change while PENDING.
    pub fn ensure_editable(&self) -> CoreResult<()> {
        match self.status {
            InvoiceStatus::Pending => Ok(()),
            _ => Err(self.invalid_state("update")),
        }
    }

    /// Only a PENDING invoice has nothing to undo and may be deleted.
    pub fn ensure_deletable(&self) -> CoreResult<()> {
        match self.status {
            InvoiceStatus::Pending => Ok(()),
            _ => Err(self.invalid_state("delete")),
        }
    }

    fn invalid_state(&self, operation: &str) -> CoreError {
        CoreError::InvalidState {
            invoice_id: self.id.clone(),
            status: self.status.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Generates an invoice code: `SAL-20260114-3F9A1C`.
///
/// The suffix is taken from the invoice id so the code stays stable if the
/// insert is retried.
pub fn generate_code(direction: InvoiceDirection, now: DateTime<Utc>, invoice_id: &str) -> String {
    let suffix: String = invoice_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{}-{}-{}", direction.code_prefix(), now.format("%Y%m%d"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================
