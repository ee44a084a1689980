//! # Counterparty Repository
//!
//! Customers and suppliers as plain records.
//!
//! This repository never writes `balance_cents`. Balances move only through
//! the [`BalanceLedger`](super::balance::BalanceLedger).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use torque_core::validation::{validate_name, validate_search_query};
use torque_core::{Counterparty, CounterpartyDetails, CounterpartyKind};

use super::generate_id;
use crate::error::{DbError, DbResult};

const COUNTERPARTY_COLUMNS: &str =
    "id, kind, name, phone, email, is_active, balance_cents, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CounterpartyRepository {
    pool: SqlitePool,
}

impl CounterpartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CounterpartyRepository { pool }
    }

    /// Creates a customer or supplier with a zero balance.
    pub async fn insert(
        &self,
        kind: CounterpartyKind,
        details: &CounterpartyDetails,
    ) -> DbResult<Counterparty> {
        validate_details(details)?;

        let now = Utc::now();
        let counterparty = Counterparty {
            id: generate_id(),
            kind,
            name: details.name.trim().to_string(),
            phone: details.phone.clone(),
            email: details.email.clone(),
            is_active: true,
            balance_cents: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %counterparty.id, kind = ?kind, "Inserting counterparty");

        sqlx::query(
            r#"
            INSERT INTO counterparties (
                id, kind, name, phone, email, is_active, balance_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)
            "#,
        )
        .bind(&counterparty.id)
        .bind(counterparty.kind)
        .bind(&counterparty.name)
        .bind(&counterparty.phone)
        .bind(&counterparty.email)
        .bind(counterparty.is_active)
        .bind(counterparty.created_at)
        .bind(counterparty.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(counterparty)
    }

    /// Gets a counterparty of the given kind. A supplier id asked for as a
    /// customer is reported as missing.
    pub async fn get(&self, kind: CounterpartyKind, id: &str) -> DbResult<Option<Counterparty>> {
        let sql = format!(
            "SELECT {COUNTERPARTY_COLUMNS} FROM counterparties WHERE id = ?1 AND kind = ?2"
        );
        let counterparty = sqlx::query_as::<_, Counterparty>(&sql)
            .bind(id)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(counterparty)
    }

    /// Like [`get`](Self::get) but fails with `NotFound`.
    pub async fn require(&self, kind: CounterpartyKind, id: &str) -> DbResult<Counterparty> {
        self.get(kind, id)
            .await?
            .ok_or_else(|| DbError::not_found(kind.label(), id))
    }

    /// Lists active counterparties of one kind by name.
    pub async fn list(&self, kind: CounterpartyKind, limit: u32) -> DbResult<Vec<Counterparty>> {
        let sql = format!(
            "SELECT {COUNTERPARTY_COLUMNS} FROM counterparties \
             WHERE kind = ?1 AND is_active = 1 ORDER BY name LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, Counterparty>(&sql)
            .bind(kind)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Searches active counterparties by name or phone.
    pub async fn search(
        &self,
        kind: CounterpartyKind,
        query: &str,
        limit: u32,
    ) -> DbResult<Vec<Counterparty>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            return self.list(kind, limit).await;
        }

        let sql = format!(
            "SELECT {COUNTERPARTY_COLUMNS} FROM counterparties \
             WHERE kind = ?1 AND is_active = 1 \
             AND (name LIKE '%' || ?2 || '%' OR phone LIKE '%' || ?2 || '%') \
             ORDER BY name LIMIT ?3"
        );
        let rows = sqlx::query_as::<_, Counterparty>(&sql)
            .bind(kind)
            .bind(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Replaces name and contact details.
    pub async fn update_details(
        &self,
        kind: CounterpartyKind,
        id: &str,
        details: &CounterpartyDetails,
    ) -> DbResult<Counterparty> {
        validate_details(details)?;
        debug!(id = %id, "Updating counterparty details");

        let sql = format!(
            "UPDATE counterparties SET name = ?3, phone = ?4, email = ?5, updated_at = ?6 \
             WHERE id = ?1 AND kind = ?2 RETURNING {COUNTERPARTY_COLUMNS}"
        );
        sqlx::query_as::<_, Counterparty>(&sql)
            .bind(id)
            .bind(kind)
            .bind(details.name.trim())
            .bind(&details.phone)
            .bind(&details.email)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(kind.label(), id))
    }

    /// Deactivates a counterparty. Its balance and history remain; new
    /// invoices naming it are rejected.
    pub async fn deactivate(&self, kind: CounterpartyKind, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating counterparty");
        let result = sqlx::query(
            "UPDATE counterparties SET is_active = 0, updated_at = ?3 WHERE id = ?1 AND kind = ?2",
        )
        .bind(id)
        .bind(kind)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(kind.label(), id));
        }
        Ok(())
    }

    /// Reads a counterparty through a no-op write, which takes the write
    /// lock for the caller's transaction before anything else is read.
    pub(crate) async fn lock_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Counterparty>> {
        let sql = format!(
            "UPDATE counterparties SET updated_at = updated_at WHERE id = ?1 \
             RETURNING {COUNTERPARTY_COLUMNS}"
        );
        let counterparty = sqlx::query_as::<_, Counterparty>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(counterparty)
    }
}

fn validate_details(details: &CounterpartyDetails) -> DbResult<()> {
    validate_name("name", &details.name)?;
    if let Some(phone) = &details.phone {
        validate_name("phone", phone)?;
    }
    if let Some(email) = &details.email {
        validate_name("email", email)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use torque_core::{CounterpartyDetails, CounterpartyKind};

    use crate::test_support::setup;
    use crate::DbError;

    fn details(name: &str, phone: Option<&str>) -> CounterpartyDetails {
        CounterpartyDetails {
            name: name.to_string(),
            phone: phone.map(str::to_string),
            email: None,
        }
    }

    #[tokio::test]
    async fn test_kinds_are_separate() {
        let db = setup().await;
        let repo = db.counterparties();
        let supplier = repo
            .insert(CounterpartyKind::Supplier, &details("Bosch Distribution", None))
            .await
            .unwrap();
        assert_eq!(supplier.balance_cents, 0);

        assert!(repo.get(CounterpartyKind::Supplier, &supplier.id).await.unwrap().is_some());
        assert!(repo.get(CounterpartyKind::Customer, &supplier.id).await.unwrap().is_none());
        assert!(matches!(
            repo.require(CounterpartyKind::Customer, &supplier.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_update_deactivate() {
        let db = setup().await;
        let repo = db.counterparties();
        let kind = CounterpartyKind::Customer;
        let garage = repo
            .insert(kind, &details("Joe's Garage", Some("555-0101")))
            .await
            .unwrap();
        repo.insert(kind, &details("Fleet Motors", Some("555-0199")))
            .await
            .unwrap();

        assert_eq!(repo.search(kind, "garage", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search(kind, "555-01", 10).await.unwrap().len(), 2);

        let renamed = repo
            .update_details(kind, &garage.id, &details("Joe's Auto Garage", None))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Joe's Auto Garage");
        assert_eq!(renamed.phone, None);

        repo.deactivate(kind, &garage.id).await.unwrap();
        assert_eq!(repo.list(kind, 10).await.unwrap().len(), 1);
        assert!(!repo.require(kind, &garage.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_rejects_blank_name() {
        let db = setup().await;
        let err = db
            .counterparties()
            .insert(CounterpartyKind::Customer, &details(" ", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), torque_core::ErrorKind::ValidationError);
    }
}
