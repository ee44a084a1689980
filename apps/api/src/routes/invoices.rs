//! # Invoice Endpoints
//!
//! One router serves both `/api/sales` and `/api/purchases`; the mount point
//! supplies the [`InvoiceDirection`] as a request extension.
//!
//! ## Request Flow
//! ```text
//! POST /api/sales { header, lines, initial_status }
//!      │
//!      ▼
//! Json<NewInvoice>  ── malformed body ──► 400 VALIDATION_ERROR
//!      │
//!      ▼
//! InvoiceService::create_from  ── InsufficientStock ──► 409 + shortfall
//!      │
//!      ▼
//! 201 InvoiceView { ...invoice, total_cents }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use torque_core::{
    Invoice, InvoiceDirection, InvoiceFilter, InvoiceStats, InvoiceSummary, InvoiceUpdate,
    NewInvoice,
};

use super::SearchParams;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/stats", get(stats))
        .route("/{id}", get(fetch).put(update).delete(remove))
        .route("/{id}/complete", post(complete))
        .route("/{id}/cancel", post(cancel))
}

/// An invoice with its derived total.
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub total_cents: i64,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        InvoiceView {
            total_cents: invoice.computed_total().cents(),
            invoice,
        }
    }
}

/// GET /, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    query: Result<Query<InvoiceFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<InvoiceSummary>>> {
    let Query(filter) = query?;
    Ok(Json(state.db.invoices(direction).list(&filter).await?))
}

/// POST /: create PENDING or directly COMPLETED.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    payload: Result<Json<NewInvoice>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InvoiceView>)> {
    let Json(command) = payload?;
    let invoice = state.db.invoices(direction).create_from(command).await?;
    Ok((StatusCode::CREATED, Json(invoice.into())))
}

#[tracing::instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Vec<InvoiceSummary>>> {
    let Query(params) = query?;
    let results = state
        .db
        .invoices(direction)
        .search(&params.q, params.limit)
        .await?;
    Ok(Json(results))
}

#[tracing::instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
) -> ApiResult<Json<InvoiceStats>> {
    Ok(Json(state.db.invoices(direction).stats().await?))
}

#[tracing::instrument(skip(state))]
pub async fn fetch(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceView>> {
    let invoice = state.db.invoices(direction).get(&id).await?;
    Ok(Json(invoice.into()))
}

/// PUT /{id}: 409 INVALID_STATE unless PENDING.
#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    Path(id): Path<String>,
    payload: Result<Json<InvoiceUpdate>, JsonRejection>,
) -> ApiResult<Json<InvoiceView>> {
    let Json(update) = payload?;
    let invoice = state.db.invoices(direction).update(&id, update).await?;
    Ok(Json(invoice.into()))
}

/// DELETE /{id}: 204, or 409 INVALID_STATE unless PENDING.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.invoices(direction).delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn complete(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceView>> {
    let invoice = state.db.invoices(direction).complete(&id).await?;
    Ok(Json(invoice.into()))
}

#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Extension(direction): Extension<InvoiceDirection>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceView>> {
    let invoice = state.db.invoices(direction).cancel(&id).await?;
    Ok(Json(invoice.into()))
}
