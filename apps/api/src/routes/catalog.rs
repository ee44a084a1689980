//! Catalog endpoints: parts, categories and stores.
//!
//! Enough surface to set up the data that invoices reference. Products are
//! created with their stock untouched; stock only arrives through a purchase.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use torque_core::{Category, NewProduct, Product, Store};

use super::SearchParams;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(fetch_product))
        .route("/categories", get(list_categories).post(create_category))
        .route("/stores", get(list_stores).post(create_store))
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// GET /products?q= searches by SKU or name; without `q` lists active parts.
#[tracing::instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Product>>> {
    let Query(params) = query?;
    let products = state.db.products();
    let found = if params.q.trim().is_empty() {
        products.list_active(params.limit).await?
    } else {
        products.search(params.q.trim(), params.limit).await?
    };
    Ok(Json(found))
}

#[tracing::instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let Json(new) = payload?;
    let product = state.db.products().insert(&new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[tracing::instrument(skip(state))]
pub async fn fetch_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::new(
                torque_core::ErrorKind::NotFound,
                format!("Product not found: {}", id),
            )
        })
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.db.catalog().list_categories().await?))
}

#[tracing::instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<NameRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let Json(request) = payload?;
    let category = state.db.catalog().create_category(&request.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_stores(State(state): State<AppState>) -> ApiResult<Json<Vec<Store>>> {
    Ok(Json(state.db.catalog().list_stores().await?))
}

#[tracing::instrument(skip(state, payload))]
pub async fn create_store(
    State(state): State<AppState>,
    payload: Result<Json<NameRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Store>)> {
    let Json(request) = payload?;
    let store = state.db.catalog().create_store(&request.name).await?;
    Ok((StatusCode::CREATED, Json(store)))
}
