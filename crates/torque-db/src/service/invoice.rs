//! # Invoice Service
//!
//! The Invoice Aggregate for one direction (sales or purchases) and the
//! transaction boundary around it.
//!
//! ## One Transaction Per Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  complete(id)                                                           │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    UPDATE invoices SET updated_at = now        ← takes the write lock  │
//! │    SELECT invoice + lines                      ← status read under it  │
//! │    ensure PENDING → COMPLETED                                           │
//! │    for each (product, store) delta:                                     │
//! │        conditional UPDATE stock_entries ...    ← check + apply, atomic  │
//! │        INSERT stock_movements                                           │
//! │    if CREDIT:                                                           │
//! │        UPDATE counterparties balance += total                           │
//! │        INSERT balance_entries                                           │
//! │    UPDATE invoices SET status = 'completed'                             │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: nothing lands.         │
//! │  SQLITE_BUSY after busy_timeout → retried once, then surfaced.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `update` and `delete` never touch the ledgers. `cancel` of a COMPLETED
//! invoice replays the negation of the journal rows its completion wrote.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use torque_core::invoice::generate_code;
use torque_core::validation::{
    validate_header, validate_initial_status, validate_lines, validate_search_query,
};
use torque_core::{
    BalanceEntryType, CoreError, Invoice, InvoiceDirection, InvoiceFilter, InvoiceHeader,
    InvoiceLine, InvoiceStats, InvoiceStatus, InvoiceSummary, InvoiceUpdate, LedgerPlan,
    LedgerPolicy, MovementReason, NewInvoice, SaleType,
};

use crate::error::{DbError, DbResult};
use crate::repository::balance::{BalanceLedger, EntrySource};
use crate::repository::catalog::CatalogRepository;
use crate::repository::counterparty::CounterpartyRepository;
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockLedger;
use crate::repository::{generate_id, invoice as rows};

/// Invoice Aggregate for one direction.
///
/// ## Usage
/// ```rust,ignore
/// let sales = db.sales();
/// let invoice = sales.create(header, lines, InvoiceStatus::Pending).await?;
/// let invoice = sales.complete(&invoice.id).await?;   // stock −qty
/// let invoice = sales.cancel(&invoice.id).await?;     // stock +qty
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceService {
    pool: SqlitePool,
    direction: InvoiceDirection,
    policy: LedgerPolicy,
}

impl InvoiceService {
    pub fn new(pool: SqlitePool, direction: InvoiceDirection, policy: LedgerPolicy) -> Self {
        InvoiceService {
            pool,
            direction,
            policy,
        }
    }

    pub fn direction(&self) -> InvoiceDirection {
        self.direction
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Creates an invoice in PENDING or directly COMPLETED.
    ///
    /// ## Errors
    /// - `Validation`: empty or malformed lines, bad header, CANCELLED as
    ///   initial status, inactive counterparty/store/product
    /// - `NotFound`: counterparty (or one of the wrong kind), store, product
    /// - `InsufficientStock`: COMPLETED sale that would oversell; nothing
    ///   is persisted, not even the invoice
    pub async fn create(
        &self,
        header: InvoiceHeader,
        lines: Vec<InvoiceLine>,
        initial_status: InvoiceStatus,
    ) -> DbResult<Invoice> {
        validate_initial_status(initial_status)?;
        let sale_type = validate_header(self.direction, &header)?;
        validate_lines(&lines)?;

        let id = generate_id();
        let (header, lines) = (&header, &lines);
        let invoice = self
            .with_conflict_retry("create", &id, || {
                self.create_once(&id, header, sale_type, lines, initial_status)
            })
            .await?;

        info!(
            invoice_id = %invoice.id,
            code = %invoice.code,
            direction = ?self.direction,
            status = %invoice.status,
            total_cents = invoice.computed_total().cents(),
            "Invoice created"
        );
        Ok(invoice)
    }

    /// [`create`](Self::create) from a typed command.
    pub async fn create_from(&self, command: NewInvoice) -> DbResult<Invoice> {
        self.create(command.header, command.lines, command.initial_status)
            .await
    }

    /// Edits a PENDING invoice. Stock and balances are never touched.
    pub async fn update(&self, id: &str, update: InvoiceUpdate) -> DbResult<Invoice> {
        let sale_type = match &update.header {
            Some(header) => validate_header(self.direction, header)?,
            None => None,
        };
        if let Some(lines) = &update.lines {
            validate_lines(lines)?;
        }

        let invoice = self
            .with_conflict_retry("update", id, || self.update_once(id, &update, sale_type))
            .await?;

        info!(
            invoice_id = %invoice.id,
            code = %invoice.code,
            total_cents = invoice.computed_total().cents(),
            "Invoice updated"
        );
        Ok(invoice)
    }

    /// PENDING → COMPLETED: applies stock deltas and, for credit invoices,
    /// the balance delta. All or nothing.
    pub async fn complete(&self, id: &str) -> DbResult<Invoice> {
        let invoice = self
            .with_conflict_retry("complete", id, || self.complete_once(id))
            .await?;

        info!(
            invoice_id = %invoice.id,
            code = %invoice.code,
            direction = ?self.direction,
            payment_type = ?invoice.payment_type,
            total_cents = invoice.computed_total().cents(),
            "Invoice completed"
        );
        Ok(invoice)
    }

    /// → CANCELLED. From COMPLETED the exact inverse of the completion is
    /// applied; from PENDING nothing moves.
    pub async fn cancel(&self, id: &str) -> DbResult<Invoice> {
        let invoice = self
            .with_conflict_retry("cancel", id, || self.cancel_once(id))
            .await?;

        info!(
            invoice_id = %invoice.id,
            code = %invoice.code,
            direction = ?self.direction,
            "Invoice cancelled"
        );
        Ok(invoice)
    }

    /// Deletes a PENDING invoice. Anything else is `InvalidState`; a
    /// COMPLETED invoice must be cancelled instead.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.with_conflict_retry("delete", id, || self.delete_once(id))
            .await?;
        info!(invoice_id = %id, direction = ?self.direction, "Invoice deleted");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<Invoice> {
        let mut conn = self.pool.acquire().await?;
        rows::fetch(&mut conn, id, self.direction)
            .await?
            .ok_or_else(|| DbError::not_found(self.direction.label(), id))
    }

    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<InvoiceSummary>> {
        debug!(direction = ?self.direction, status = ?filter.status, "Listing invoices");
        rows::list(&self.pool, self.direction, filter).await
    }

    /// Matches code, counterparty name or notes. An empty query lists the
    /// most recent invoices.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<InvoiceSummary>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            let filter = InvoiceFilter {
                limit,
                ..Default::default()
            };
            return self.list(&filter).await;
        }
        rows::search(&self.pool, self.direction, &query, limit).await
    }

    pub async fn stats(&self) -> DbResult<InvoiceStats> {
        rows::stats(&self.pool, self.direction).await
    }

    // =========================================================================
    // Transaction bodies
    // =========================================================================

    async fn create_once(
        &self,
        id: &str,
        header: &InvoiceHeader,
        sale_type: Option<SaleType>,
        lines: &[InvoiceLine],
        initial_status: InvoiceStatus,
    ) -> DbResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        self.check_references(&mut tx, header).await?;
        check_products(&mut tx, lines).await?;

        let mut invoice = Invoice {
            id: id.to_string(),
            code: header
                .code
                .clone()
                .unwrap_or_else(|| generate_code(self.direction, now, id)),
            direction: self.direction,
            counterparty_id: header.counterparty_id.clone(),
            store_id: header.store_id.clone(),
            sale_type,
            status: InvoiceStatus::Pending,
            payment_type: header.payment_type,
            payment_method: header.payment_method,
            notes: header.notes.clone(),
            lines: lines.to_vec(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_at: None,
        };

        rows::insert(&mut tx, &invoice).await.map_err(|e| match e {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: invoice.code.clone(),
            },
            other => other,
        })?;

        if initial_status == InvoiceStatus::Completed {
            self.apply_completion(&mut tx, &mut invoice, now).await?;
        }

        tx.commit().await?;
        Ok(invoice)
    }

    async fn update_once(
        &self,
        id: &str,
        update: &InvoiceUpdate,
        sale_type: Option<SaleType>,
    ) -> DbResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut invoice = self.lock(&mut tx, id, now).await?;
        invoice.ensure_editable()?;

        if let Some(header) = &update.header {
            self.check_references(&mut tx, header).await?;
            if let Some(code) = &header.code {
                invoice.code = code.clone();
            }
            invoice.counterparty_id = header.counterparty_id.clone();
            invoice.store_id = header.store_id.clone();
            invoice.sale_type = sale_type;
            invoice.payment_type = header.payment_type;
            invoice.payment_method = header.payment_method;
            invoice.notes = header.notes.clone();
        }

        if let Some(lines) = &update.lines {
            check_products(&mut tx, lines).await?;
            rows::replace_lines(&mut tx, id, lines).await?;
            invoice.lines = lines.clone();
        }

        invoice.updated_at = now;
        rows::update_header(&mut tx, &invoice).await?;

        tx.commit().await?;
        Ok(invoice)
    }

    async fn complete_once(&self, id: &str) -> DbResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut invoice = self.lock(&mut tx, id, now).await?;

        self.apply_completion(&mut tx, &mut invoice, now).await?;

        tx.commit().await?;
        Ok(invoice)
    }

    async fn cancel_once(&self, id: &str) -> DbResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut invoice = self.lock(&mut tx, id, now).await?;
        invoice.ensure_transition(InvoiceStatus::Cancelled)?;

        if invoice.status == InvoiceStatus::Completed {
            let movements = StockLedger::movements_in(&mut tx, id).await?;
            let entries = BalanceLedger::entries_for_invoice_in(&mut tx, id).await?;
            let reversal = LedgerPlan::from_journal(
                self.direction.counterparty_kind(),
                &movements,
                &entries,
            )
            .inverse();

            debug!(
                invoice_id = %id,
                stock_deltas = reversal.stock.len(),
                has_balance = reversal.balance.is_some(),
                "Reversing completion"
            );

            self.apply_plan(
                &mut tx,
                &invoice,
                &reversal,
                self.direction.cancellation_reason(),
                BalanceEntryType::InvoiceReversal,
                now,
            )
            .await?;
        }

        rows::set_status(&mut tx, id, InvoiceStatus::Cancelled, now).await?;
        invoice.status = InvoiceStatus::Cancelled;
        invoice.cancelled_at = Some(now);
        invoice.updated_at = now;

        tx.commit().await?;
        Ok(invoice)
    }

    async fn delete_once(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let invoice = self.lock(&mut tx, id, now).await?;
        invoice.ensure_deletable()?;

        rows::delete(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Takes the write lock via the invoice row, then reads the invoice.
    async fn lock(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Invoice> {
        let not_found = || DbError::not_found(self.direction.label(), id);
        if !rows::touch(conn, id, self.direction, now).await? {
            return Err(not_found());
        }
        rows::fetch(conn, id, self.direction)
            .await?
            .ok_or_else(not_found)
    }

    /// Counterparty (right kind, active) and store (active).
    async fn check_references(
        &self,
        conn: &mut SqliteConnection,
        header: &InvoiceHeader,
    ) -> DbResult<()> {
        let kind = self.direction.counterparty_kind();
        let counterparty = CounterpartyRepository::lock_in(conn, &header.counterparty_id)
            .await?
            .filter(|c| c.kind == kind)
            .ok_or_else(|| DbError::not_found(kind.label(), &header.counterparty_id))?;
        if !counterparty.is_active {
            return Err(CoreError::inactive(kind.label(), &counterparty.id).into());
        }

        let store = CatalogRepository::get_store_in(conn, &header.store_id)
            .await?
            .ok_or_else(|| DbError::not_found("Store", &header.store_id))?;
        if !store.is_active {
            return Err(CoreError::inactive("Store", &store.id).into());
        }
        Ok(())
    }

    async fn apply_completion(
        &self,
        conn: &mut SqliteConnection,
        invoice: &mut Invoice,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        invoice.ensure_transition(InvoiceStatus::Completed)?;

        let plan = invoice.completion_plan();
        self.apply_plan(
            conn,
            invoice,
            &plan,
            self.direction.completion_reason(),
            BalanceEntryType::InvoiceCredit,
            now,
        )
        .await?;

        rows::set_status(conn, &invoice.id, InvoiceStatus::Completed, now).await?;
        invoice.status = InvoiceStatus::Completed;
        invoice.completed_at = Some(now);
        invoice.updated_at = now;
        Ok(())
    }

    /// Applies and journals every delta in `plan`. The first failing delta
    /// aborts with its error; the caller's transaction is then dropped.
    async fn apply_plan(
        &self,
        conn: &mut SqliteConnection,
        invoice: &Invoice,
        plan: &LedgerPlan,
        reason: MovementReason,
        entry_type: BalanceEntryType,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        for delta in &plan.stock {
            let product = ProductRepository::get_in(conn, &delta.product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &delta.product_id))?;
            let allow_negative = self.policy.permits_negative(product.allow_backorder);

            StockLedger::apply_delta(conn, delta, allow_negative, now).await?;
            StockLedger::record_movement(conn, delta, &invoice.id, reason, now).await?;
        }

        if let Some(balance) = &plan.balance {
            BalanceLedger::apply_delta(
                conn,
                balance,
                EntrySource {
                    entry_type,
                    invoice_id: Some(&invoice.id),
                    method: Some(invoice.payment_method),
                    reference: Some(&invoice.code),
                },
                now,
            )
            .await?;
        }
        Ok(())
    }

    /// Runs `op`, and once more if it failed on lock contention.
    async fn with_conflict_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        id: &str,
        mut op: F,
    ) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        match op().await {
            Err(e) if e.is_retryable() => {
                warn!(
                    operation,
                    invoice_id = %id,
                    error = %e,
                    "Lock contention, retrying once"
                );
                op().await
            }
            other => other,
        }
    }
}

/// Every referenced product exists and is active.
async fn check_products(conn: &mut SqliteConnection, lines: &[InvoiceLine]) -> DbResult<()> {
    let ids: BTreeSet<&str> = lines.iter().map(|l| l.product_id.as_str()).collect();
    for id in ids {
        let product = ProductRepository::get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        if !product.is_active {
            return Err(CoreError::inactive("Product", id).into());
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    use torque_core::{
        CoreError, CounterpartyDetails, CounterpartyKind, ErrorKind, InvoiceFilter, InvoiceHeader,
        InvoiceLine, InvoiceStatus, InvoiceUpdate, PaymentMethod, PaymentRecord, PaymentType,
        SaleType,
    };

    use crate::test_support::{fixture, header, new_product, setup, stock_up, Fixture};
    use crate::{Database, DbConfig, DbError};

    fn is_insufficient(err: &DbError) -> bool {
        matches!(err, DbError::Domain(CoreError::InsufficientStock { .. }))
    }

    fn is_invalid_state(err: &DbError) -> bool {
        matches!(err, DbError::Domain(CoreError::InvalidState { .. }))
    }

    async fn qty(db: &Database, f: &Fixture) -> i64 {
        db.stock().get_quantity(&f.product.id, &f.store.id).await.unwrap()
    }

    /// A file-backed database, so several connections contend for one lock.
    async fn file_db(busy_timeout: Duration) -> (Database, PathBuf) {
        let path = std::env::temp_dir().join(format!("torque-test-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(4)
                .busy_timeout(busy_timeout),
        )
        .await
        .unwrap();
        (db, path)
    }

    async fn remove_file_db(db: Database, path: &Path) {
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_complete_then_cancel_restores_stock() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 5, 10)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.sale_type, Some(SaleType::Regular));
        assert!(invoice.code.starts_with("SAL-"));
        assert_eq!(qty(&db, &f).await, 5);

        let completed = sales.complete(&invoice.id).await.unwrap();
        assert_eq!(completed.status, InvoiceStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.computed_total().cents(), 50);
        assert_eq!(qty(&db, &f).await, 0);

        let cancelled = sales.cancel(&invoice.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
        assert_eq!(qty(&db, &f).await, 5);

        let movements = db.stock().movements_for_invoice(&invoice.id).await.unwrap();
        assert_eq!(movements.iter().map(|m| m.delta).sum::<i64>(), 0);
        assert_eq!(movements.len(), 2);

        let stored = sales.get(&invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Cancelled);
        assert!(stored.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_completions_never_oversell() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let sales = db.sales();
        let a = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 3, 10)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();
        let b = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 4, 10)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();

        let (ra, rb) = tokio::join!(sales.complete(&a.id), sales.complete(&b.id));

        let remaining = qty(&db, &f).await;
        match (ra, rb) {
            (Ok(_), Err(e)) => {
                assert!(is_insufficient(&e));
                assert_eq!(remaining, 2);
                assert_eq!(sales.get(&b.id).await.unwrap().status, InvoiceStatus::Pending);
            }
            (Err(e), Ok(_)) => {
                assert!(is_insufficient(&e));
                assert_eq!(remaining, 1);
                assert_eq!(sales.get(&a.id).await.unwrap().status, InvoiceStatus::Pending);
            }
            other => panic!("exactly one completion must succeed: {other:?}"),
        }
        assert!(remaining >= 0);
    }

    #[tokio::test]
    async fn test_concurrent_completions_on_shared_file() {
        let (db, path) = file_db(Duration::from_secs(5)).await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let sales = db.sales();
        let mut ids = Vec::new();
        for quantity in [3, 4] {
            let invoice = sales
                .create(
                    header(&f.customer, &f.store, PaymentType::Cash),
                    vec![InvoiceLine::new(&f.product.id, quantity, 10)],
                    InvoiceStatus::Pending,
                )
                .await
                .unwrap();
            ids.push(invoice.id);
        }

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let sales = sales.clone();
                tokio::spawn(async move { sales.complete(&id).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut sold = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(invoice) => {
                    succeeded += 1;
                    sold += invoice.lines[0].quantity;
                }
                Err(e) => assert!(is_insufficient(&e), "unexpected error: {e:?}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(qty(&db, &f).await, 5 - sold);

        remove_file_db(db, &path).await;
    }

    async fn pending_sale(db: &Database, f: &Fixture, quantity: i64) -> String {
        db.sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, quantity, 10)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_held_write_lock_surfaces_retryable_conflict() {
        let busy = Duration::from_millis(50);
        let (db, path) = file_db(busy).await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;
        let id = pending_sale(&db, &f, 2).await;

        let mut holder = db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *holder)
            .await
            .unwrap();

        let started = Instant::now();
        let err = db.sales().complete(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_retryable(), "unexpected error: {err:?}");
        // Both attempts waited out the busy timeout.
        assert!(started.elapsed() >= busy * 2);

        sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
        drop(holder);

        assert_eq!(db.sales().get(&id).await.unwrap().status, InvoiceStatus::Pending);
        assert_eq!(qty(&db, &f).await, 5);

        remove_file_db(db, &path).await;
    }

    #[tokio::test]
    async fn test_lock_released_before_retry_completes() {
        let (db, path) = file_db(Duration::from_millis(200)).await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;
        let id = pending_sale(&db, &f, 2).await;

        let mut holder = db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *holder)
            .await
            .unwrap();

        // Released after the first attempt gave up, inside the second one's wait.
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
        });

        let completed = db.sales().complete(&id).await.unwrap();
        release.await.unwrap();

        assert_eq!(completed.status, InvoiceStatus::Completed);
        assert_eq!(qty(&db, &f).await, 3);

        remove_file_db(db, &path).await;
    }

    #[tokio::test]
    async fn test_credit_sale_moves_balance_and_back() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 10).await;

        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Credit),
                vec![InvoiceLine::new(&f.product.id, 4, 50)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        assert_eq!(invoice.computed_total().cents(), 200);

        let balances = db.balances();
        assert_eq!(balances.get_balance(&f.customer.id).await.unwrap().cents(), 200);

        sales.cancel(&invoice.id).await.unwrap();
        assert!(balances.get_balance(&f.customer.id).await.unwrap().is_zero());
        assert!(balances.journal_total(&f.customer.id).await.unwrap().is_zero());
        assert_eq!(balances.entries(&f.customer.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cash_sale_leaves_balance_alone() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 10).await;

        db.sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 1, 50)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        assert!(db.balances().get_balance(&f.customer.id).await.unwrap().is_zero());
        assert!(db.balances().entries(&f.customer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credit_purchase_and_payment() {
        let db = setup().await;
        let f = fixture(&db).await;

        let purchases = db.purchases();
        let invoice = purchases
            .create(
                header(&f.supplier, &f.store, PaymentType::Credit),
                vec![InvoiceLine::new(&f.product.id, 10, 600)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        assert!(invoice.code.starts_with("PUR-"));
        assert_eq!(invoice.sale_type, None);
        assert_eq!(qty(&db, &f).await, 10);

        let balances = db.balances();
        assert_eq!(balances.get_balance(&f.supplier.id).await.unwrap().cents(), 6_000);

        let balance = balances
            .record_payment(&PaymentRecord {
                counterparty_id: f.supplier.id.clone(),
                kind: CounterpartyKind::Supplier,
                amount_cents: 2_500,
                method: PaymentMethod::Check,
                reference: None,
            })
            .await
            .unwrap();
        assert_eq!(balance.cents(), 3_500);
        assert_eq!(balances.journal_total(&f.supplier.id).await.unwrap(), balance);
    }

    #[tokio::test]
    async fn test_cancel_purchase_after_goods_sold() {
        let db = setup().await;
        let f = fixture(&db).await;

        let purchase = db
            .purchases()
            .create(
                header(&f.supplier, &f.store, PaymentType::Credit),
                vec![InvoiceLine::new(&f.product.id, 4, 600)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        db.sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 3, 1_000)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();

        let err = db.purchases().cancel(&purchase.id).await.unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(qty(&db, &f).await, 1);
        assert_eq!(
            db.balances().get_balance(&f.supplier.id).await.unwrap().cents(),
            2_400
        );
        assert_eq!(
            db.purchases().get(&purchase.id).await.unwrap().status,
            InvoiceStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_delete_completed_is_rejected() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Credit),
                vec![InvoiceLine::new(&f.product.id, 2, 100)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();

        let err = sales.delete(&invoice.id).await.unwrap_err();
        assert!(is_invalid_state(&err));
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let stored = sales.get(&invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Completed);
        assert_eq!(stored.lines, invoice.lines);
        assert_eq!(qty(&db, &f).await, 3);
        assert_eq!(db.balances().get_balance(&f.customer.id).await.unwrap().cents(), 200);
    }

    #[tokio::test]
    async fn test_complete_twice_is_rejected() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Credit),
                vec![InvoiceLine::new(&f.product.id, 2, 100)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();
        sales.complete(&invoice.id).await.unwrap();

        let err = sales.complete(&invoice.id).await.unwrap_err();
        assert!(is_invalid_state(&err));
        assert_eq!(qty(&db, &f).await, 3);
        assert_eq!(db.balances().get_balance(&f.customer.id).await.unwrap().cents(), 200);
        assert_eq!(db.stock().movements_for_invoice(&invoice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_is_terminal() {
        let db = setup().await;
        let f = fixture(&db).await;

        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 1, 100)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();

        // Nothing was applied, so nothing is reversed.
        sales.cancel(&invoice.id).await.unwrap();
        assert!(db.stock().movements_for_invoice(&invoice.id).await.unwrap().is_empty());

        assert!(is_invalid_state(&sales.cancel(&invoice.id).await.unwrap_err()));
        assert!(is_invalid_state(&sales.complete(&invoice.id).await.unwrap_err()));
        assert!(is_invalid_state(&sales.delete(&invoice.id).await.unwrap_err()));
        assert!(is_invalid_state(
            &sales
                .update(&invoice.id, InvoiceUpdate::default())
                .await
                .unwrap_err()
        ));
    }

    #[tokio::test]
    async fn test_oversell_rejects_whole_invoice() {
        let db = setup().await;
        let f = fixture(&db).await;
        let filter = db.products().insert(&new_product("FLT-OIL-1", "Oil Filter")).await.unwrap();
        stock_up(&db, &f, &f.product.id, 5).await;
        stock_up(&db, &f, &filter.id, 1).await;

        let sales = db.sales();
        let err = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Credit),
                vec![
                    InvoiceLine::new(&f.product.id, 2, 100),
                    InvoiceLine::new(&filter.id, 3, 100),
                ],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap_err();

        let core = err.as_domain().expect("domain error");
        assert_eq!(core.shortfall(), Some(2));
        match core {
            CoreError::InsufficientStock { product_id, .. } => assert_eq!(product_id, &filter.id),
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(qty(&db, &f).await, 5);
        assert_eq!(db.stock().get_quantity(&filter.id, &f.store.id).await.unwrap(), 1);
        assert!(db.balances().get_balance(&f.customer.id).await.unwrap().is_zero());
        assert!(sales.list(&InvoiceFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_lines_checked_together() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let err = db
            .sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![
                    InvoiceLine::new(&f.product.id, 3, 100),
                    InvoiceLine::new(&f.product.id, 3, 100),
                ],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap_err();
        assert!(is_insufficient(&err));
        assert_eq!(qty(&db, &f).await, 5);
    }

    #[tokio::test]
    async fn test_backorder_overrides() {
        let db = setup().await;
        let f = fixture(&db).await;
        let mut special = new_product("SPC-ORD-1", "Special Order Gasket");
        special.allow_backorder = true;
        let special = db.products().insert(&special).await.unwrap();

        db.sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&special.id, 2, 100)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        assert_eq!(db.stock().get_quantity(&special.id, &f.store.id).await.unwrap(), -2);

        let lenient = Database::new(DbConfig::in_memory().allow_backorder(true))
            .await
            .unwrap();
        let g = fixture(&lenient).await;
        lenient
            .sales()
            .create(
                header(&g.customer, &g.store, PaymentType::Cash),
                vec![InvoiceLine::new(&g.product.id, 1, 100)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        assert_eq!(qty(&lenient, &g).await, -1);
    }

    #[tokio::test]
    async fn test_update_pending_never_touches_stock() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 5).await;

        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 1, 100)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();

        let mut new_header = header(&f.customer, &f.store, PaymentType::Credit);
        new_header.sale_type = Some(SaleType::Branch);
        new_header.notes = Some("fleet order".to_string());
        let updated = sales
            .update(
                &invoice.id,
                InvoiceUpdate {
                    header: Some(new_header),
                    lines: Some(vec![
                        InvoiceLine::new(&f.product.id, 4, 125),
                        InvoiceLine::new(&f.product.id, 1, 0),
                    ]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.code, invoice.code);
        assert_eq!(updated.payment_type, PaymentType::Credit);
        assert_eq!(updated.sale_type, Some(SaleType::Branch));
        assert_eq!(updated.computed_total().cents(), 500);
        assert_eq!(qty(&db, &f).await, 5);

        let stored = sales.get(&invoice.id).await.unwrap();
        assert_eq!(stored.lines, updated.lines);
        assert_eq!(stored.notes.as_deref(), Some("fleet order"));

        sales.complete(&invoice.id).await.unwrap();
        assert_eq!(qty(&db, &f).await, 0);
        assert_eq!(db.balances().get_balance(&f.customer.id).await.unwrap().cents(), 500);

        let err = sales
            .update(
                &invoice.id,
                InvoiceUpdate {
                    header: None,
                    lines: Some(vec![InvoiceLine::new(&f.product.id, 1, 1)]),
                },
            )
            .await
            .unwrap_err();
        assert!(is_invalid_state(&err));
    }

    #[tokio::test]
    async fn test_delete_pending() {
        let db = setup().await;
        let f = fixture(&db).await;
        let sales = db.sales();
        let invoice = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 1, 100)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();

        sales.delete(&invoice.id).await.unwrap();
        assert!(matches!(
            sales.get(&invoice.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            sales.delete(&invoice.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_directions_do_not_mix() {
        let db = setup().await;
        let f = fixture(&db).await;
        let invoice = db
            .sales()
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 1, 100)],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();

        assert!(matches!(
            db.purchases().get(&invoice.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.purchases().complete(&invoice.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_validation_and_references() {
        let db = setup().await;
        let f = fixture(&db).await;
        let sales = db.sales();
        let cash = || header(&f.customer, &f.store, PaymentType::Cash);
        let line = || vec![InvoiceLine::new(&f.product.id, 1, 100)];

        let err = sales.create(cash(), vec![], InvoiceStatus::Pending).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = sales
            .create(cash(), vec![InvoiceLine::new(&f.product.id, 0, 100)], InvoiceStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = sales.create(cash(), line(), InvoiceStatus::Cancelled).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        // A supplier is not a customer.
        let err = sales
            .create(
                header(&f.supplier, &f.store, PaymentType::Cash),
                line(),
                InvoiceStatus::Pending,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut missing = cash();
        missing.counterparty_id = "00000000-0000-4000-8000-000000000000".to_string();
        let err = sales.create(missing, line(), InvoiceStatus::Pending).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = sales
            .create(cash(), vec![InvoiceLine::new("no-such-part", 1, 1)], InvoiceStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut branch_purchase: InvoiceHeader = header(&f.supplier, &f.store, PaymentType::Cash);
        branch_purchase.sale_type = Some(SaleType::Branch);
        let err = db
            .purchases()
            .create(branch_purchase, line(), InvoiceStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        db.counterparties()
            .deactivate(CounterpartyKind::Customer, &f.customer.id)
            .await
            .unwrap();
        let err = sales.create(cash(), line(), InvoiceStatus::Pending).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Inactive { .. })));
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        assert!(sales.list(&InvoiceFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let db = setup().await;
        let f = fixture(&db).await;
        let mut h = header(&f.customer, &f.store, PaymentType::Cash);
        h.code = Some("SAL-0001".to_string());

        db.sales()
            .create(h.clone(), vec![InvoiceLine::new(&f.product.id, 1, 1)], InvoiceStatus::Pending)
            .await
            .unwrap();
        let err = db
            .sales()
            .create(h, vec![InvoiceLine::new(&f.product.id, 1, 1)], InvoiceStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_list_search_stats() {
        let db = setup().await;
        let f = fixture(&db).await;
        stock_up(&db, &f, &f.product.id, 20).await;

        let fleet = db
            .counterparties()
            .insert(
                CounterpartyKind::Customer,
                &CounterpartyDetails {
                    name: "Fleet Motors".to_string(),
                    phone: None,
                    email: None,
                },
            )
            .await
            .unwrap();

        let sales = db.sales();
        let pending = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![
                    InvoiceLine::new(&f.product.id, 1, 100),
                    InvoiceLine::new(&f.product.id, 2, 50),
                ],
                InvoiceStatus::Pending,
            )
            .await
            .unwrap();
        sales
            .create(
                header(&fleet, &f.store, PaymentType::Credit),
                vec![InvoiceLine::new(&f.product.id, 3, 100)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        let cancelled = sales
            .create(
                header(&f.customer, &f.store, PaymentType::Cash),
                vec![InvoiceLine::new(&f.product.id, 1, 999)],
                InvoiceStatus::Completed,
            )
            .await
            .unwrap();
        sales.cancel(&cancelled.id).await.unwrap();

        let all = sales.list(&InvoiceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        let summary = all.iter().find(|s| s.id == pending.id).unwrap();
        assert_eq!(summary.total_cents, 200);
        assert_eq!(summary.line_count, 2);
        assert_eq!(summary.counterparty_name, "Joe's Garage");

        let only_pending = sales
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_pending.len(), 1);

        let fleet_hits = sales.search("fleet", 10).await.unwrap();
        assert_eq!(fleet_hits.len(), 1);
        assert_eq!(fleet_hits[0].total_cents, 300);
        assert_eq!(sales.search(&pending.code, 10).await.unwrap().len(), 1);

        let stats = sales.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completed_total_cents, 300);
        assert_eq!(stats.credit_total_cents, 300);

        // The stock-up purchase is the only purchase.
        assert_eq!(db.purchases().stats().await.unwrap().total, 1);
    }
}
