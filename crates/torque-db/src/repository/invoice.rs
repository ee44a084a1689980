//! Invoice header and line rows.
//!
//! Crate-private: invoices are only written through
//! [`InvoiceService`](crate::service::invoice::InvoiceService), which owns
//! the transaction and the state machine. Every function here runs on the
//! connection it is given.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use torque_core::{
    Invoice, InvoiceDirection, InvoiceFilter, InvoiceLine, InvoiceStats, InvoiceStatus,
    InvoiceSummary, PaymentMethod, PaymentType, SaleType,
};

use crate::error::DbResult;

const HEADER_COLUMNS: &str = "id, code, direction, counterparty_id, store_id, sale_type, status, \
     payment_type, payment_method, notes, created_at, updated_at, completed_at, cancelled_at";

/// Summary select shared by list and search. The total is summed from the
/// lines; there is no stored total to read.
const SUMMARY_SELECT: &str = r#"
    SELECT
        i.id, i.code, i.direction, i.counterparty_id,
        c.name AS counterparty_name,
        i.store_id, i.status, i.payment_type, i.payment_method,
        COUNT(l.line_no) AS line_count,
        COALESCE(SUM(l.quantity * l.unit_price_cents), 0) AS total_cents,
        i.created_at, i.updated_at
    FROM invoices i
    JOIN counterparties c ON c.id = i.counterparty_id
    LEFT JOIN invoice_lines l ON l.invoice_id = i.id
"#;

#[derive(Debug, sqlx::FromRow)]
struct HeaderRow {
    id: String,
    code: String,
    direction: InvoiceDirection,
    counterparty_id: String,
    store_id: String,
    sale_type: Option<SaleType>,
    status: InvoiceStatus,
    payment_type: PaymentType,
    payment_method: PaymentMethod,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl HeaderRow {
    fn with_lines(self, lines: Vec<InvoiceLine>) -> Invoice {
        Invoice {
            id: self.id,
            code: self.code,
            direction: self.direction,
            counterparty_id: self.counterparty_id,
            store_id: self.store_id,
            sale_type: self.sale_type,
            status: self.status,
            payment_type: self.payment_type,
            payment_method: self.payment_method,
            notes: self.notes,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
        }
    }
}

/// Bumps `updated_at` on the invoice. As the first statement of a
/// transaction this takes the database write lock, so the status read that
/// follows cannot be overtaken by another writer.
///
/// Returns `false` when no invoice of that direction exists.
pub(crate) async fn touch(
    conn: &mut SqliteConnection,
    id: &str,
    direction: InvoiceDirection,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query("UPDATE invoices SET updated_at = ?3 WHERE id = ?1 AND direction = ?2")
        .bind(id)
        .bind(direction)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    id: &str,
    direction: InvoiceDirection,
) -> DbResult<Option<Invoice>> {
    let sql = format!("SELECT {HEADER_COLUMNS} FROM invoices WHERE id = ?1 AND direction = ?2");
    let header = sqlx::query_as::<_, HeaderRow>(&sql)
        .bind(id)
        .bind(direction)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(header) = header else {
        return Ok(None);
    };

    let lines = sqlx::query_as::<_, InvoiceLine>(
        "SELECT product_id, quantity, unit_price_cents FROM invoice_lines \
         WHERE invoice_id = ?1 ORDER BY line_no",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(header.with_lines(lines)))
}

pub(crate) async fn insert(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO invoices ({HEADER_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    );
    sqlx::query(&sql)
        .bind(&invoice.id)
        .bind(&invoice.code)
        .bind(invoice.direction)
        .bind(&invoice.counterparty_id)
        .bind(&invoice.store_id)
        .bind(invoice.sale_type)
        .bind(invoice.status)
        .bind(invoice.payment_type)
        .bind(invoice.payment_method)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .bind(invoice.completed_at)
        .bind(invoice.cancelled_at)
        .execute(&mut *conn)
        .await?;

    insert_lines(conn, &invoice.id, &invoice.lines).await
}

/// Rewrites the header fields a PENDING edit may change.
pub(crate) async fn update_header(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE invoices SET
            code = ?2, counterparty_id = ?3, store_id = ?4, sale_type = ?5,
            payment_type = ?6, payment_method = ?7, notes = ?8, updated_at = ?9
        WHERE id = ?1
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.code)
    .bind(&invoice.counterparty_id)
    .bind(&invoice.store_id)
    .bind(invoice.sale_type)
    .bind(invoice.payment_type)
    .bind(invoice.payment_method)
    .bind(&invoice.notes)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn replace_lines(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    lines: &[InvoiceLine],
) -> DbResult<()> {
    sqlx::query("DELETE FROM invoice_lines WHERE invoice_id = ?1")
        .bind(invoice_id)
        .execute(&mut *conn)
        .await?;
    insert_lines(conn, invoice_id, lines).await
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    lines: &[InvoiceLine],
) -> DbResult<()> {
    for (line_no, line) in lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO invoice_lines (invoice_id, line_no, product_id, quantity, unit_price_cents) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(invoice_id)
        .bind(line_no as i64)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: InvoiceStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE invoices SET
            status = ?2,
            updated_at = ?3,
            completed_at = CASE WHEN ?2 = 'completed' THEN ?3 ELSE completed_at END,
            cancelled_at = CASE WHEN ?2 = 'cancelled' THEN ?3 ELSE cancelled_at END
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deletes a header; lines go with it (ON DELETE CASCADE).
pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM invoices WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn list(
    pool: &SqlitePool,
    direction: InvoiceDirection,
    filter: &InvoiceFilter,
) -> DbResult<Vec<InvoiceSummary>> {
    let sql = format!(
        "{SUMMARY_SELECT} WHERE i.direction = ?1 AND (?2 IS NULL OR i.status = ?2) \
         GROUP BY i.id ORDER BY i.created_at DESC, i.code DESC LIMIT ?3 OFFSET ?4"
    );
    let rows = sqlx::query_as::<_, InvoiceSummary>(&sql)
        .bind(direction)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub(crate) async fn search(
    pool: &SqlitePool,
    direction: InvoiceDirection,
    query: &str,
    limit: u32,
) -> DbResult<Vec<InvoiceSummary>> {
    let sql = format!(
        "{SUMMARY_SELECT} WHERE i.direction = ?1 AND (\
             i.code LIKE '%' || ?2 || '%' \
             OR c.name LIKE '%' || ?2 || '%' \
             OR i.notes LIKE '%' || ?2 || '%') \
         GROUP BY i.id ORDER BY i.created_at DESC, i.code DESC LIMIT ?3"
    );
    let rows = sqlx::query_as::<_, InvoiceSummary>(&sql)
        .bind(direction)
        .bind(query)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub(crate) async fn stats(
    pool: &SqlitePool,
    direction: InvoiceDirection,
) -> DbResult<InvoiceStats> {
    let stats = sqlx::query_as::<_, InvoiceStats>(
        r#"
        WITH per_invoice AS (
            SELECT i.status AS status,
                   i.payment_type AS payment_type,
                   COALESCE(SUM(l.quantity * l.unit_price_cents), 0) AS amount
            FROM invoices i
            LEFT JOIN invoice_lines l ON l.invoice_id = i.id
            WHERE i.direction = ?1
            GROUP BY i.id
        )
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(status = 'pending'), 0) AS pending,
            COALESCE(SUM(status = 'completed'), 0) AS completed,
            COALESCE(SUM(status = 'cancelled'), 0) AS cancelled,
            COALESCE(SUM(CASE WHEN status = 'completed' THEN amount ELSE 0 END), 0)
                AS completed_total_cents,
            COALESCE(SUM(CASE WHEN status = 'completed' AND payment_type = 'credit'
                              THEN amount ELSE 0 END), 0)
                AS credit_total_cents
        FROM per_invoice
        "#,
    )
    .bind(direction)
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
