//! # Customer and Supplier Endpoints
//!
//! Mounted twice; the [`CounterpartyKind`] comes from the mount point. Record
//! CRUD never touches balances. Balances move only through invoices and
//! `POST /{id}/payments`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use torque_core::{
    BalanceEntry, Counterparty, CounterpartyDetails, CounterpartyKind, PaymentMethod,
    PaymentRecord,
};

use super::ListParams;
use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search/{query}", get(search))
        .route("/{id}", get(fetch).put(update).delete(deactivate))
        .route("/{id}/balance", get(balance))
        .route("/{id}/payments", axum::routing::post(record_payment))
}

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub counterparty_id: String,
    pub balance_cents: i64,
    /// Sum of the journal; always equal to `balance_cents`.
    pub journal_total_cents: i64,
    pub entries: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub counterparty_id: String,
    pub balance_cents: i64,
}

#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Counterparty>>> {
    let Query(params) = query?;
    Ok(Json(state.db.counterparties().list(kind, params.limit).await?))
}

#[tracing::instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    Path(query): Path<String>,
) -> ApiResult<Json<Vec<Counterparty>>> {
    Ok(Json(state.db.counterparties().search(kind, &query, 50).await?))
}

#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    payload: Result<Json<CounterpartyDetails>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Counterparty>)> {
    let Json(details) = payload?;
    let counterparty = state.db.counterparties().insert(kind, &details).await?;
    Ok((StatusCode::CREATED, Json(counterparty)))
}

#[tracing::instrument(skip(state))]
pub async fn fetch(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    Path(id): Path<String>,
) -> ApiResult<Json<Counterparty>> {
    Ok(Json(state.db.counterparties().require(kind, &id).await?))
}

#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    Path(id): Path<String>,
    payload: Result<Json<CounterpartyDetails>, JsonRejection>,
) -> ApiResult<Json<Counterparty>> {
    let Json(details) = payload?;
    Ok(Json(
        state.db.counterparties().update_details(kind, &id, &details).await?,
    ))
}

#[tracing::instrument(skip(state))]
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.counterparties().deactivate(kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /{id}/balance: current balance plus the journal behind it.
#[tracing::instrument(skip(state))]
pub async fn balance(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    Path(id): Path<String>,
) -> ApiResult<Json<BalanceView>> {
    let counterparty = state.db.counterparties().require(kind, &id).await?;
    let ledger = state.db.balances();
    let entries = ledger.entries(&id).await?;
    let journal_total = ledger.journal_total(&id).await?;

    Ok(Json(BalanceView {
        counterparty_id: counterparty.id,
        balance_cents: counterparty.balance_cents,
        journal_total_cents: journal_total.cents(),
        entries,
    }))
}

#[tracing::instrument(skip(state, payload))]
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(kind): Extension<CounterpartyKind>,
    Path(id): Path<String>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> ApiResult<Json<PaymentResponse>> {
    let Json(request) = payload?;
    let balance = state
        .db
        .balances()
        .record_payment(&PaymentRecord {
            counterparty_id: id.clone(),
            kind,
            amount_cents: request.amount_cents,
            method: request.method,
            reference: request.reference,
        })
        .await?;

    Ok(Json(PaymentResponse {
        counterparty_id: id,
        balance_cents: balance.cents(),
    }))
}
