//! # Balance Ledger
//!
//! Authoritative running balance per counterparty.
//!
//! ## Sign Convention
//! ```text
//!   credit sale completed       customer  +total   (customer owes more)
//!   credit purchase completed   supplier  +total   (we owe supplier more)
//!   either cancelled            same      −total
//!   payment recorded            either    −amount
//!
//!   No floor or ceiling: a negative balance is overpayment credit.
//! ```
//!
//! Every change writes the balance and a `balance_entries` row in the same
//! transaction, so `balance_cents == Σ delta_cents` holds for every
//! counterparty at all times ([`BalanceLedger::journal_total`]).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use torque_core::validation::validate_payment_amount;
use torque_core::{
    BalanceDelta, BalanceEntry, BalanceEntryType, CoreError, Money, PaymentMethod, PaymentRecord,
};

use super::counterparty::CounterpartyRepository;
use super::generate_id;
use crate::error::{DbError, DbResult};

const ENTRY_COLUMNS: &str =
    "id, counterparty_id, invoice_id, entry_type, delta_cents, method, reference, created_at";

/// Where a journal entry came from.
#[derive(Debug, Clone)]
pub(crate) struct EntrySource<'a> {
    pub entry_type: BalanceEntryType,
    pub invoice_id: Option<&'a str>,
    pub method: Option<PaymentMethod>,
    pub reference: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct BalanceLedger {
    pool: SqlitePool,
}

impl BalanceLedger {
    pub fn new(pool: SqlitePool) -> Self {
        BalanceLedger { pool }
    }

    /// Current balance. Fails with `NotFound` for an unknown id.
    pub async fn get_balance(&self, counterparty_id: &str) -> DbResult<Money> {
        let cents: Option<i64> =
            sqlx::query_scalar("SELECT balance_cents FROM counterparties WHERE id = ?1")
                .bind(counterparty_id)
                .fetch_optional(&self.pool)
                .await?;
        cents
            .map(Money::from_cents)
            .ok_or_else(|| DbError::not_found("Counterparty", counterparty_id))
    }

    /// The journal of one counterparty, oldest first.
    pub async fn entries(&self, counterparty_id: &str) -> DbResult<Vec<BalanceEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM balance_entries WHERE counterparty_id = ?1 \
             ORDER BY created_at, rowid"
        );
        let entries = sqlx::query_as::<_, BalanceEntry>(&sql)
            .bind(counterparty_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Σ of the journal. Always equal to [`get_balance`](Self::get_balance).
    pub async fn journal_total(&self, counterparty_id: &str) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta_cents), 0) FROM balance_entries WHERE counterparty_id = ?1",
        )
        .bind(counterparty_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_cents(total))
    }

    /// Records a payment received from a customer or made to a supplier.
    ///
    /// Applies `−amount` and journals a `PAYMENT` entry in one transaction.
    /// Returns the new balance.
    pub async fn record_payment(&self, payment: &PaymentRecord) -> DbResult<Money> {
        validate_payment_amount(payment.amount_cents)?;

        let mut tx = self.pool.begin().await?;

        // Wrong kind is "not found" from the caller's point of view.
        let counterparty =
            CounterpartyRepository::lock_in(&mut *tx, &payment.counterparty_id).await?;
        if counterparty.map(|c| c.kind) != Some(payment.kind) {
            return Err(CoreError::not_found(payment.kind.label(), &payment.counterparty_id).into());
        }

        let delta = BalanceDelta {
            counterparty_id: payment.counterparty_id.clone(),
            kind: payment.kind,
            delta: -Money::from_cents(payment.amount_cents),
        };
        let balance = Self::apply_delta(
            &mut *tx,
            &delta,
            EntrySource {
                entry_type: BalanceEntryType::Payment,
                invoice_id: None,
                method: Some(payment.method),
                reference: payment.reference.as_deref(),
            },
            Utc::now(),
        )
        .await?;

        tx.commit().await?;

        info!(
            counterparty_id = %payment.counterparty_id,
            amount_cents = payment.amount_cents,
            balance_cents = balance.cents(),
            "Payment recorded"
        );
        Ok(balance)
    }

    /// Applies one signed delta, journals it, and returns the new balance.
    pub(crate) async fn apply_delta(
        conn: &mut SqliteConnection,
        delta: &BalanceDelta,
        source: EntrySource<'_>,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        debug!(
            counterparty_id = %delta.counterparty_id,
            delta_cents = delta.delta.cents(),
            entry_type = ?source.entry_type,
            "Applying balance delta"
        );

        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE counterparties
            SET balance_cents = balance_cents + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING balance_cents
            "#,
        )
        .bind(&delta.counterparty_id)
        .bind(delta.delta.cents())
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        let balance =
            balance.ok_or_else(|| DbError::not_found(delta.kind.label(), &delta.counterparty_id))?;

        sqlx::query(
            r#"
            INSERT INTO balance_entries (
                id, counterparty_id, invoice_id, entry_type, delta_cents, method, reference, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(generate_id())
        .bind(&delta.counterparty_id)
        .bind(source.invoice_id)
        .bind(source.entry_type)
        .bind(delta.delta.cents())
        .bind(source.method)
        .bind(source.reference)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(Money::from_cents(balance))
    }

    pub(crate) async fn entries_for_invoice_in(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<BalanceEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM balance_entries WHERE invoice_id = ?1 \
             ORDER BY created_at, rowid"
        );
        let entries = sqlx::query_as::<_, BalanceEntry>(&sql)
            .bind(invoice_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(entries)
    }
}
