//! Shared fixtures for the crate's tests.

use torque_core::{
    Counterparty, CounterpartyDetails, CounterpartyKind, InvoiceHeader, InvoiceLine,
    InvoiceStatus, NewProduct, PaymentMethod, PaymentType, Product, Store,
};

use crate::{Database, DbConfig};

pub(crate) async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) struct Fixture {
    pub store: Store,
    pub customer: Counterparty,
    pub supplier: Counterparty,
    pub product: Product,
}

pub(crate) fn new_product(sku: &str, name: &str) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: name.to_string(),
        category_id: None,
        price_cents: 1_000,
        cost_cents: Some(600),
        reorder_level: 2,
        allow_backorder: false,
    }
}

pub(crate) async fn fixture(db: &Database) -> Fixture {
    let store = db.catalog().create_store("Main Street").await.unwrap();
    let customer = db
        .counterparties()
        .insert(
            CounterpartyKind::Customer,
            &CounterpartyDetails {
                name: "Joe's Garage".to_string(),
                phone: None,
                email: None,
            },
        )
        .await
        .unwrap();
    let supplier = db
        .counterparties()
        .insert(
            CounterpartyKind::Supplier,
            &CounterpartyDetails {
                name: "Bosch Distribution".to_string(),
                phone: None,
                email: None,
            },
        )
        .await
        .unwrap();
    let product = db
        .products()
        .insert(&new_product("BRK-PAD-0412", "Brake Pad Set"))
        .await
        .unwrap();

    Fixture {
        store,
        customer,
        supplier,
        product,
    }
}

pub(crate) fn header(
    counterparty: &Counterparty,
    store: &Store,
    payment_type: PaymentType,
) -> InvoiceHeader {
    InvoiceHeader {
        code: None,
        counterparty_id: counterparty.id.clone(),
        store_id: store.id.clone(),
        sale_type: None,
        payment_type,
        payment_method: PaymentMethod::Cash,
        notes: None,
    }
}

/// Brings stock in through a completed cash purchase, the only way stock
/// enters the ledger.
pub(crate) async fn stock_up(db: &Database, f: &Fixture, product_id: &str, quantity: i64) {
    db.purchases()
        .create(
            header(&f.supplier, &f.store, PaymentType::Cash),
            vec![InvoiceLine::new(product_id, quantity, 600)],
            InvoiceStatus::Completed,
        )
        .await
        .unwrap();
}
