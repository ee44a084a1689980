//! # Product Repository
//!
//! Database operations for the auto-parts catalog.
//!
//! ## Key Operations
//! - Insert, lookup by id or SKU
//! - Prefix/substring search across SKU and name
//! - Soft delete
//!
//! Products never carry stock. Quantities live in the Stock Ledger, per
//! store.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use torque_core::validation::{
    validate_name, validate_price_cents, validate_reorder_level, validate_search_query,
    validate_sku,
};
use torque_core::{NewProduct, Product};

use super::generate_id;
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, sku, name, category_id, price_cents, cost_cents, \
     reorder_level, allow_backorder, is_active, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let pads = repo.search("brake", 20).await?;
/// let part = repo.get_by_sku("BRK-PAD-0412").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Adds a part to the catalog.
    ///
    /// ## Errors
    /// - `Validation` on a malformed SKU, name or price
    /// - `UniqueViolation` when the SKU is taken
    /// - `NotFound` when `category_id` names no category
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validate_sku(&new.sku)?;
        validate_name("name", &new.name)?;
        validate_price_cents(new.price_cents)?;
        if let Some(cost) = new.cost_cents {
            validate_price_cents(cost)?;
        }
        validate_reorder_level(new.reorder_level)?;

        if let Some(category_id) = &new.category_id {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM categories WHERE id = ?1")
                    .bind(category_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Category", category_id));
            }
        }

        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            category_id: new.category_id.clone(),
            price_cents: new.price_cents,
            cost_cents: new.cost_cents,
            reorder_level: new.reorder_level,
            allow_backorder: new.allow_backorder,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category_id, price_cents, cost_cents,
                reorder_level, allow_backorder, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.reorder_level)
        .bind(product.allow_backorder)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.sku.clone(),
            },
            other => other,
        })?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Searches active products by SKU prefix or name substring.
    ///
    /// An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND (sku LIKE ?1 || '%' OR name LIKE '%' || ?1 || '%') \
             ORDER BY name LIMIT ?2"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Soft-deletes a product. Invoices that reference it keep working.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result =
            sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Reads a product on the caller's transaction.
    pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{new_product, setup};
    use crate::DbError;
    use torque_core::CoreError;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = setup().await;
        let repo = db.products();

        let product = repo.insert(&new_product("BRK-PAD-0412", "Brake Pad Set")).await.unwrap();
        assert!(product.is_active);

        let by_id = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(by_id, product);

        let by_sku = repo.get_by_sku("BRK-PAD-0412").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = setup().await;
        let repo = db.products();
        repo.insert(&new_product("OIL-5W30", "Engine Oil 5W-30")).await.unwrap();

        let err = repo.insert(&new_product("OIL-5W30", "Other Oil")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "OIL-5W30"));
    }

    #[tokio::test]
    async fn test_insert_validates() {
        let db = setup().await;
        let mut bad = new_product("BAD SKU", "Spark Plug");
        let err = db.products().insert(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        bad.sku = "PLUG-1".to_string();
        bad.category_id = Some("nope".to_string());
        let err = db.products().insert(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_search_and_deactivate() {
        let db = setup().await;
        let repo = db.products();
        let pads = repo.insert(&new_product("BRK-PAD-1", "Front Brake Pads")).await.unwrap();
        repo.insert(&new_product("BRK-DSC-1", "Brake Disc")).await.unwrap();
        repo.insert(&new_product("FLT-AIR-1", "Air Filter")).await.unwrap();

        assert_eq!(repo.search("brake", 10).await.unwrap().len(), 2);
        assert_eq!(repo.search("FLT", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("", 10).await.unwrap().len(), 3);

        repo.deactivate(&pads.id).await.unwrap();
        assert_eq!(repo.search("brake", 10).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(matches!(
            repo.deactivate("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
