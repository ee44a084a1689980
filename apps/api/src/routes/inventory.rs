//! Inventory report endpoints. Read-only; an empty report is a 200.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use torque_core::{InventoryReport, ReportFilter};

use crate::error::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(report))
        .route("/low-stock", get(low_stock))
        .route("/out-of-stock", get(out_of_stock))
        .route("/category/{id}", get(by_category))
        .route("/product/{id}", get(by_product))
}

#[tracing::instrument(skip(state))]
pub async fn report(
    State(state): State<AppState>,
    query: Result<Query<ReportFilter>, QueryRejection>,
) -> ApiResult<Json<InventoryReport>> {
    let Query(filter) = query?;
    Ok(Json(state.db.inventory_reports().report(&filter).await?))
}

#[tracing::instrument(skip(state))]
pub async fn low_stock(
    State(state): State<AppState>,
    query: Result<Query<ReportFilter>, QueryRejection>,
) -> ApiResult<Json<InventoryReport>> {
    let Query(filter) = query?;
    Ok(Json(state.db.inventory_reports().low_stock(&filter).await?))
}

#[tracing::instrument(skip(state))]
pub async fn out_of_stock(
    State(state): State<AppState>,
    query: Result<Query<ReportFilter>, QueryRejection>,
) -> ApiResult<Json<InventoryReport>> {
    let Query(filter) = query?;
    Ok(Json(state.db.inventory_reports().out_of_stock(&filter).await?))
}

#[tracing::instrument(skip(state))]
pub async fn by_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InventoryReport>> {
    Ok(Json(state.db.inventory_reports().by_category(&id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn by_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InventoryReport>> {
    Ok(Json(state.db.inventory_reports().by_product(&id).await?))
}
