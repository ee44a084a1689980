//! # Inventory Report Service
//!
//! Read-only stock views: full report, low stock, out of stock, per
//! category, per product.
//!
//! Every report is a single read transaction, so under WAL it sees one
//! committed snapshot of the Stock Ledger even while invoices complete
//! concurrently. Rows cover every active product × every active store; a
//! cell that has never been stocked reports quantity 0.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use torque_core::{InventoryReport, ReportFilter, StockLevel, StockReportRow};

use crate::error::{DbError, DbResult};

const REPORT_SQL: &str = r#"
    SELECT
        p.id AS product_id,
        p.sku,
        p.name AS product_name,
        p.category_id,
        c.name AS category_name,
        s.id AS store_id,
        s.name AS store_name,
        COALESCE(e.quantity, 0) AS quantity,
        p.reorder_level
    FROM products p
    CROSS JOIN stores s
    LEFT JOIN stock_entries e ON e.product_id = p.id AND e.store_id = s.id
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE (p.is_active = 1 OR p.id = ?2)
      AND (s.is_active = 1 OR s.id = ?3)
      AND (?1 IS NULL OR p.category_id = ?1)
      AND (?2 IS NULL OR p.id = ?2)
      AND (?3 IS NULL OR s.id = ?3)
    ORDER BY p.name, p.sku, s.name
"#;

#[derive(Debug, sqlx::FromRow)]
struct ReportRecord {
    product_id: String,
    sku: String,
    product_name: String,
    category_id: Option<String>,
    category_name: Option<String>,
    store_id: String,
    store_name: String,
    quantity: i64,
    reorder_level: i64,
}

impl From<ReportRecord> for StockReportRow {
    fn from(r: ReportRecord) -> Self {
        StockReportRow {
            level: StockLevel::classify(r.quantity, r.reorder_level),
            product_id: r.product_id,
            sku: r.sku,
            product_name: r.product_name,
            category_id: r.category_id,
            category_name: r.category_name,
            store_id: r.store_id,
            store_name: r.store_name,
            quantity: r.quantity,
            reorder_level: r.reorder_level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryReportService {
    pool: SqlitePool,
}

impl InventoryReportService {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryReportService { pool }
    }

    /// Full report for the filter.
    ///
    /// ## Errors
    /// `NotFound` when the filter names a category, product or store that
    /// does not exist. A known id with nothing in stock is an empty report.
    pub async fn report(&self, filter: &ReportFilter) -> DbResult<InventoryReport> {
        debug!(
            category_id = ?filter.category_id,
            product_id = ?filter.product_id,
            store_id = ?filter.store_id,
            "Building inventory report"
        );

        let mut tx = self.pool.begin().await?;
        ensure_filter_targets(&mut tx, filter).await?;

        let records = sqlx::query_as::<_, ReportRecord>(REPORT_SQL)
            .bind(filter.category_id.as_deref())
            .bind(filter.product_id.as_deref())
            .bind(filter.store_id.as_deref())
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(InventoryReport::from_rows(
            records.into_iter().map(StockReportRow::from).collect(),
        ))
    }

    /// Rows with `0 < quantity ≤ reorder_level`.
    pub async fn low_stock(&self, filter: &ReportFilter) -> DbResult<InventoryReport> {
        Ok(self.report(filter).await?.only(StockLevel::LowStock))
    }

    /// Rows with `quantity ≤ 0`, backorders included.
    pub async fn out_of_stock(&self, filter: &ReportFilter) -> DbResult<InventoryReport> {
        Ok(self.report(filter).await?.only(StockLevel::OutOfStock))
    }

    pub async fn by_category(&self, category_id: &str) -> DbResult<InventoryReport> {
        self.report(&ReportFilter::category(category_id)).await
    }

    pub async fn by_product(&self, product_id: &str) -> DbResult<InventoryReport> {
        self.report(&ReportFilter::product(product_id)).await
    }
}

async fn ensure_filter_targets(conn: &mut SqliteConnection, filter: &ReportFilter) -> DbResult<()> {
    let targets = [
        ("categories", "Category", &filter.category_id),
        ("products", "Product", &filter.product_id),
        ("stores", "Store", &filter.store_id),
    ];
    for (table, entity, id) in targets {
        let Some(id) = id else { continue };
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = ?1)");
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            return Err(DbError::not_found(entity, id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use torque_core::{ErrorKind, InvoiceLine, InvoiceStatus, PaymentType, ReportFilter, StockLevel};

    use crate::test_support::{fixture, header, new_product, setup, stock_up};

    #[tokio::test]
    async fn test_report_classifies_every_cell() {
        let db = setup().await;
        let f = fixture(&db).await;
        let annex = db.catalog().create_store("Annex").await.unwrap();
        let filter = db.products().insert(&new_product("FLT-OIL-1", "Oil Filter")).await.unwrap();

        stock_up(&db, &f, &f.product.id, 10).await;
        stock_up(&db, &f, &filter.id, 2).await;

        let report = db.inventory_reports().report(&ReportFilter::default()).await.unwrap();
        // 2 products x 2 stores, unstocked cells included.
        assert_eq!(report.summary.rows, 4);
        assert_eq!(report.summary.in_stock, 1);
        assert_eq!(report.summary.low_stock, 1);
        assert_eq!(report.summary.out_of_stock, 2);
        assert_eq!(report.summary.total_units, 12);

        let annex_rows: Vec<_> = report.rows.iter().filter(|r| r.store_id == annex.id).collect();
        assert_eq!(annex_rows.len(), 2);
        assert!(annex_rows.iter().all(|r| r.quantity == 0));

        let low = db.inventory_reports().low_stock(&ReportFilter::default()).await.unwrap();
        assert_eq!(low.rows.len(), 1);
        assert_eq!(low.rows[0].product_id, filter.id);
        assert_eq!(low.rows[0].level, StockLevel::LowStock);

        let out = db.inventory_reports().out_of_stock(&ReportFilter::default()).await.unwrap();
        assert_eq!(out.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_sale_moves_report() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        db.sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 5, 10)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();

        let report = db.inventory_reports().by_product(&f.product.id).await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].quantity, 0);
        assert_eq!(report.rows[0].level, StockLevel::OutOfStock);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let db = setup().await;
        let f = fixture(&db).await;
        let brakes = db.catalog().create_category("Brakes").await.unwrap();
        let empty = db.catalog().create_category("Exhaust").await.unwrap();

        let mut rotor = new_product("BRK-ROT-220", "Brake Rotor");
        rotor.category_id = Some(brakes.id.clone());
        let rotor = db.products().insert(&rotor).await.unwrap();
        stock_up(&db, &f, &rotor.id, 7).await;

        let reports = db.inventory_reports();
        let report = reports.by_category(&brakes.id).await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].sku, "BRK-ROT-220");
        assert_eq!(report.rows[0].category_name.as_deref(), Some("Brakes"));
        assert_eq!(report.rows[0].level, StockLevel::InStock);

        let report = reports.by_category(&empty.id).await.unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.summary.rows, 0);
    }

    #[tokio::test]
    async fn test_unknown_filter_targets() {
        let db = setup().await;
        let reports = db.inventory_reports();

        let err = reports.by_category("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = reports.by_product("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let filter = ReportFilter {
            store_id: Some("missing".to_string()),
            ..Default::default()
        };
        assert_eq!(reports.report(&filter).await.unwrap_err().kind(), ErrorKind::NotFound);

        // An empty catalog is a valid, empty report.
        let report = reports.report(&ReportFilter::default()).await.unwrap();
        assert!(report.rows.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_rows_hidden_unless_asked_for() {
        let db = setup().await;
        let f = fixture(&db).await;
        db.products().deactivate(&f.product.id).await.unwrap();

        let reports = db.inventory_reports();
        assert!(reports.report(&ReportFilter::default()).await.unwrap().rows.is_empty());
        assert_eq!(reports.by_product(&f.product.id).await.unwrap().rows.len(), 1);
    }
}
