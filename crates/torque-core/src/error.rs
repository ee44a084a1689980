//! # Error Types
//!
//! Domain-specific error types for torque-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  torque-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Malformed input                                │
//! │  └── ErrorKind        - Stable machine-readable kind                   │
//! │                                                                         │
//! │  torque-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, lock contention              │
//! │                                                                         │
//! │  torque-api errors (HTTP app)                                          │
//! │  └── ApiError         - What clients see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable, machine-readable error kind.
///
/// Every error that leaves the engine carries exactly one of these. The HTTP
/// layer maps kinds to status codes; clients switch on the serialized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed input. No side effects were applied.
    ValidationError,
    /// Missing invoice, counterparty, product, store or category.
    NotFound,
    /// A stock cell would go below zero.
    InsufficientStock,
    /// Illegal status transition or edit of a non-PENDING invoice.
    InvalidState,
    /// Concurrent modification or duplicate key.
    Conflict,
    /// Genuine storage failure.
    Storage,
}

impl ErrorKind {
    /// Returns the serialized name (`"NOT_FOUND"`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Storage => "STORAGE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the invoice engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Input failed validation before any work was done.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A referenced record exists but is deactivated.
    #[error("{entity} {id} is inactive")]
    Inactive { entity: String, id: String },

    /// A stock cell would go negative.
    ///
    /// ## When This Occurs
    /// ```text
    /// Stock(P, S1) = 3
    ///      │
    ///      ▼
    /// complete(sale with P × 5)
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: P, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole invoice rejected, nothing applied (shortfall = 2)
    /// ```
    #[error(
        "Insufficient stock for product {product_id} in store {store_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        store_id: String,
        available: i64,
        requested: i64,
    },

    /// The invoice's current status does not allow the operation.
    #[error("Invoice {invoice_id} is {status}, cannot {operation}")]
    InvalidState {
        invoice_id: String,
        status: String,
        operation: String,
    },
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an Inactive error for a given entity type and ID.
    pub fn inactive(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::Inactive {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Maps the error onto its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::Inactive { .. } => ErrorKind::ValidationError,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Units missing to satisfy the request (stock errors only).
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => Some(*requested - (*available).max(0)),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements and are always
/// raised before a transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A collection that must have members is empty.
    #[error("{field} must not be empty")]
    Empty { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set, or not allowed in this context.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "brake-pad".to_string(),
            store_id: "main".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product brake-pad in store main: available 3, requested 5"
        );
        assert_eq!(err.shortfall(), Some(2));
    }

    #[test]
    fn test_shortfall_ignores_backordered_cells() {
        let err = CoreError::InsufficientStock {
            product_id: "p".to_string(),
            store_id: "s".to_string(),
            available: -2,
            requested: 4,
        };
        assert_eq!(err.shortfall(), Some(4));
        assert_eq!(CoreError::not_found("Product", "p").shortfall(), None);
    }

    #[test]
    fn test_kinds() {
        let validation: CoreError = ValidationError::Empty {
            field: "lines".to_string(),
        }
        .into();
        assert_eq!(validation.kind(), ErrorKind::ValidationError);
        assert_eq!(
            CoreError::inactive("Customer", "c1").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(CoreError::not_found("Invoice", "i1").kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::InvalidState {
                invoice_id: "i1".into(),
                status: "CANCELLED".into(),
                operation: "cancel".into(),
            }
            .kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_kind_serializes_screaming() {
        let json = serde_json::to_string(&ErrorKind::InsufficientStock).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_STOCK\"");
        assert_eq!(ErrorKind::ValidationError.as_str(), "VALIDATION_ERROR");
    }
}
