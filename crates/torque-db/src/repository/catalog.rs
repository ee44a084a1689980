//! # Catalog Repository
//!
//! Categories and stores. Plain records with no ledger side effects.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use torque_core::validation::validate_name;
use torque_core::{Category, Store};

use super::generate_id;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn create_category(&self, name: &str) -> DbResult<Category> {
        validate_name("name", name)?;
        let category = Category {
            id: generate_id(),
            name: name.trim().to_string(),
        };
        debug!(id = %category.id, name = %category.name, "Creating category");

        sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    pub async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        let category =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    pub async fn create_store(&self, name: &str) -> DbResult<Store> {
        validate_name("name", name)?;
        let store = Store {
            id: generate_id(),
            name: name.trim().to_string(),
            is_active: true,
        };
        debug!(id = %store.id, name = %store.name, "Creating store");

        sqlx::query("INSERT INTO stores (id, name, is_active) VALUES (?1, ?2, ?3)")
            .bind(&store.id)
            .bind(&store.name)
            .bind(store.is_active)
            .execute(&self.pool)
            .await?;

        Ok(store)
    }

    pub async fn get_store(&self, id: &str) -> DbResult<Option<Store>> {
        let store =
            sqlx::query_as::<_, Store>("SELECT id, name, is_active FROM stores WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(store)
    }

    pub async fn list_stores(&self) -> DbResult<Vec<Store>> {
        let stores =
            sqlx::query_as::<_, Store>("SELECT id, name, is_active FROM stores ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(stores)
    }

    /// Closes a store. Its stock rows stay, but it drops out of reports and
    /// no new invoice may name it.
    pub async fn deactivate_store(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE stores SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Store", id));
        }
        Ok(())
    }

    pub(crate) async fn get_store_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Store>> {
        let store =
            sqlx::query_as::<_, Store>("SELECT id, name, is_active FROM stores WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::setup;

    #[tokio::test]
    async fn test_categories() {
        let db = setup().await;
        let catalog = db.catalog();
        let brakes = catalog.create_category("Brakes").await.unwrap();
        catalog.create_category("Filters").await.unwrap();

        assert_eq!(catalog.get_category(&brakes.id).await.unwrap(), Some(brakes));
        let names: Vec<_> = catalog
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Brakes", "Filters"]);
        assert!(catalog.create_category("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_stores() {
        let db = setup().await;
        let catalog = db.catalog();
        let store = catalog.create_store("Downtown").await.unwrap();
        assert!(catalog.get_store(&store.id).await.unwrap().unwrap().is_active);

        catalog.deactivate_store(&store.id).await.unwrap();
        assert!(!catalog.get_store(&store.id).await.unwrap().unwrap().is_active);
        assert_eq!(catalog.list_stores().await.unwrap().len(), 1);
        assert!(catalog.deactivate_store("missing").await.is_err());
    }
}
