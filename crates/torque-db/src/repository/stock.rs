//! # Stock Ledger
//!
//! Authoritative quantity-on-hand per (product, store).
//!
//! ## Atomic Check-and-Apply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  delta ≥ 0 (or backorder allowed)                                      │
//! │     INSERT ... ON CONFLICT DO UPDATE SET quantity = quantity + delta   │
//! │                                                                         │
//! │  delta < 0                                                              │
//! │     UPDATE stock_entries SET quantity = quantity + delta               │
//! │     WHERE product_id = ? AND store_id = ? AND quantity + delta >= 0    │
//! │     RETURNING quantity                                                  │
//! │         │                                                               │
//! │         ├── row returned → applied                                     │
//! │         └── no row       → InsufficientStock, nothing applied          │
//! │                                                                         │
//! │  The check and the write are one statement, so two transactions can   │
//! │  never both pass the check on the same units.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations are crate-private and take the caller's connection: the only
//! caller is the invoice service, from inside a `complete` or `cancel`
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use torque_core::{CoreError, MovementReason, StockDelta, StockEntry, StockMovement};

use super::generate_id;
use crate::error::DbResult;

const MOVEMENT_COLUMNS: &str = "id, product_id, store_id, invoice_id, delta, reason, created_at";

#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Quantity on hand. A cell that was never stocked holds 0.
    pub async fn get_quantity(&self, product_id: &str, store_id: &str) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM stock_entries WHERE product_id = ?1 AND store_id = ?2",
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quantity.unwrap_or(0))
    }

    /// Every stocked cell for one product.
    pub async fn entries_for_product(&self, product_id: &str) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            "SELECT product_id, store_id, quantity, updated_at FROM stock_entries \
             WHERE product_id = ?1 ORDER BY store_id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// The movement journal of one invoice, oldest first.
    pub async fn movements_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<StockMovement>> {
        let mut conn = self.pool.acquire().await?;
        Self::movements_in(&mut conn, invoice_id).await
    }

    /// Applies one signed delta and returns the new quantity.
    ///
    /// ## Errors
    /// `InsufficientStock` when the result would be negative and
    /// `allow_negative` is off. Nothing is written in that case.
    pub(crate) async fn apply_delta(
        conn: &mut SqliteConnection,
        delta: &StockDelta,
        allow_negative: bool,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        debug!(
            product_id = %delta.product_id,
            store_id = %delta.store_id,
            delta = delta.delta,
            "Applying stock delta"
        );

        if delta.delta >= 0 || allow_negative {
            let quantity: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO stock_entries (product_id, store_id, quantity, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (product_id, store_id) DO UPDATE SET
                    quantity = quantity + excluded.quantity,
                    updated_at = excluded.updated_at
                RETURNING quantity
                "#,
            )
            .bind(&delta.product_id)
            .bind(&delta.store_id)
            .bind(delta.delta)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
            return Ok(quantity);
        }

        let applied: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_entries
            SET quantity = quantity + ?3, updated_at = ?4
            WHERE product_id = ?1 AND store_id = ?2 AND quantity + ?3 >= 0
            RETURNING quantity
            "#,
        )
        .bind(&delta.product_id)
        .bind(&delta.store_id)
        .bind(delta.delta)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        match applied {
            Some(quantity) => Ok(quantity),
            None => {
                let available: Option<i64> = sqlx::query_scalar(
                    "SELECT quantity FROM stock_entries WHERE product_id = ?1 AND store_id = ?2",
                )
                .bind(&delta.product_id)
                .bind(&delta.store_id)
                .fetch_optional(&mut *conn)
                .await?;

                Err(CoreError::InsufficientStock {
                    product_id: delta.product_id.clone(),
                    store_id: delta.store_id.clone(),
                    available: available.unwrap_or(0),
                    requested: -delta.delta,
                }
                .into())
            }
        }
    }

    /// Journals an applied delta.
    pub(crate) async fn record_movement(
        conn: &mut SqliteConnection,
        delta: &StockDelta,
        invoice_id: &str,
        reason: MovementReason,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, store_id, invoice_id, delta, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(generate_id())
        .bind(&delta.product_id)
        .bind(&delta.store_id)
        .bind(invoice_id)
        .bind(delta.delta)
        .bind(reason)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub(crate) async fn movements_in(
        conn: &mut SqliteConnection,
        invoice_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE invoice_id = ?1 \
             ORDER BY created_at, rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(invoice_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use torque_core::{CoreError, StockDelta};

    use super::StockLedger;
    use crate::test_support::{fixture, setup};
    use crate::DbError;

    fn delta(product_id: &str, store_id: &str, delta: i64) -> StockDelta {
        StockDelta {
            product_id: product_id.to_string(),
            store_id: store_id.to_string(),
            delta,
        }
    }

    #[tokio::test]
    async fn test_unstocked_cell_reads_zero() {
        let db = setup().await;
        let f = fixture(&db).await;
        assert_eq!(db.stock().get_quantity(&f.product.id, &f.store.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_apply_and_reject() {
        let db = setup().await;
        let f = fixture(&db).await;
        let mut tx = db.pool().begin().await.unwrap();

        let q = StockLedger::apply_delta(
            &mut *tx,
            &delta(&f.product.id, &f.store.id, 5),
            false,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(q, 5);

        let q = StockLedger::apply_delta(
            &mut *tx,
            &delta(&f.product.id, &f.store.id, -5),
            false,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(q, 0);

        let err = StockLedger::apply_delta(
            &mut *tx,
            &delta(&f.product.id, &f.store.id, -1),
            false,
            Utc::now(),
        )
        .await
        .unwrap_err();
        match err {
            DbError::Domain(e @ CoreError::InsufficientStock { .. }) => {
                assert_eq!(e.shortfall(), Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        tx.commit().await.unwrap();
        assert_eq!(db.stock().get_quantity(&f.product.id, &f.store.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_decrement_on_missing_cell() {
        let db = setup().await;
        let f = fixture(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = StockLedger::apply_delta(
            &mut conn,
            &delta(&f.product.id, &f.store.id, -2),
            false,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, requested: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_backorder_goes_negative() {
        let db = setup().await;
        let f = fixture(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        let q = StockLedger::apply_delta(
            &mut conn,
            &delta(&f.product.id, &f.store.id, -3),
            true,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(q, -3);
        drop(conn);

        let entries = db.stock().entries_for_product(&f.product.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity, -3);
    }
}
