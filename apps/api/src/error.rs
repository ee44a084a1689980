//! # API Error Type
//!
//! Every failed request answers with the same body:
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for product ... available 3, requested 5",
//!   "details": { "product_id": "...", "store_id": "...", "shortfall": 2 }
//! }
//! ```
//!
//! ## Status Mapping
//! ```text
//! VALIDATION_ERROR    → 400
//! NOT_FOUND           → 404
//! INSUFFICIENT_STOCK  → 409
//! INVALID_STATE       → 409
//! CONFLICT            → 409   (retryable)
//! STORAGE             → 500   (logged, generic message)
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use torque_core::{CoreError, ErrorKind};
use torque_db::DbError;

/// API error returned from handlers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable kind
    pub code: ErrorKind,

    /// Human-readable message
    pub message: String,

    /// Structured context (stock shortfall, retry hint)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::ValidationError, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InsufficientStock | ErrorKind::InvalidState | ErrorKind::Conflict => {
                StatusCode::CONFLICT
            }
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let kind = err.kind();
        match &err {
            DbError::Domain(CoreError::InsufficientStock {
                product_id,
                store_id,
                available,
                requested,
            }) => ApiError::new(kind, err.to_string()).with_details(json!({
                "product_id": product_id,
                "store_id": store_id,
                "available": available,
                "requested": requested,
                "shortfall": err.as_domain().and_then(CoreError::shortfall),
            })),
            _ if err.is_retryable() => {
                tracing::warn!(error = %err, "Request lost a lock race");
                ApiError::new(kind, "The record is busy, retry the request")
                    .with_details(json!({ "retryable": true }))
            }
            _ if kind == ErrorKind::Storage => {
                // Log the actual error but return a generic message
                tracing::error!(error = %err, "Storage failure");
                ApiError::new(kind, "Database operation failed")
            }
            _ => ApiError::new(kind, err.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        DbError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;
