//! # torque-api
//!
//! HTTP routing layer over the Torque invoice engine.
//!
//! ## Routes
//! ```text
//! GET    /health
//!
//! /api/sales, /api/purchases              (same tree, direction from the mount)
//!   GET    /                 list           ?status=&limit=&offset=
//!   POST   /                 create         201
//!   GET    /search           search         ?q=&limit=
//!   GET    /stats            stats
//!   GET    /{id}             get
//!   PUT    /{id}             update         PENDING only
//!   DELETE /{id}             delete         204, PENDING only
//!   POST   /{id}/complete    complete
//!   POST   /{id}/cancel      cancel
//!
//! /api/inventory
//!   GET    /  /low-stock  /out-of-stock   ?category_id=&product_id=&store_id=
//!   GET    /category/{id}  /product/{id}
//!
//! /api/customers, /api/suppliers
//!   GET /  GET /search/{query}  POST /  GET|PUT|DELETE /{id}
//!   GET /{id}/balance  POST /{id}/payments
//!
//! /api/products, /api/categories, /api/stores   (plain catalog records)
//! ```

pub mod config;
pub mod error;
pub mod routes;

use axum::routing::get;
use axum::{Extension, Router};
use torque_core::{CounterpartyKind, InvoiceDirection};
use torque_db::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}

/// Builds the application router.
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .nest(
            "/sales",
            routes::invoices::router().layer(Extension(InvoiceDirection::Sale)),
        )
        .nest(
            "/purchases",
            routes::invoices::router().layer(Extension(InvoiceDirection::Purchase)),
        )
        .nest(
            "/customers",
            routes::counterparties::router().layer(Extension(CounterpartyKind::Customer)),
        )
        .nest(
            "/suppliers",
            routes::counterparties::router().layer(Extension(CounterpartyKind::Supplier)),
        )
        .nest("/inventory", routes::inventory::router())
        .merge(routes::catalog::router());

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", api)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
