//! # Validation Module
//!
//! Input validation for invoice commands and catalog records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (torque-api)                                   │
//! │  ├── JSON → typed command (NewInvoice, InvoiceUpdate)                  │
//! │  └── Unknown enum names rejected by serde                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any transaction is opened)               │
//! │  ├── Lines non-empty, quantity > 0, unit price ≥ 0                     │
//! │  └── Header shape (sale type, code, initial status)                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Invoice service (inside the transaction)                     │
//! │  ├── Counterparty exists, right kind, active                           │
//! │  └── Stock availability (atomic with the decrement)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use torque_core::types::InvoiceLine;
//! use torque_core::validation::validate_lines;
//!
//! let lines = vec![InvoiceLine::new("p1", 5, 1000)];
//! let total = validate_lines(&lines).unwrap();
//! assert_eq!(total.cents(), 5000);
//!
//! assert!(validate_lines(&[]).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{InvoiceDirection, InvoiceHeader, InvoiceLine, InvoiceStatus, SaleType};
use crate::{MAX_INVOICE_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (part number).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens, underscores and dots only
///
/// ## Example
/// ```rust
/// use torque_core::validation::validate_sku;
///
/// assert!(validate_sku("BRK-PAD-0412").is_ok());
/// assert!(validate_sku("OIL.5W30").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores and dots"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, category, store, counterparty).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a caller-supplied invoice code.
///
/// ## Rules
/// - 1 to 40 characters
/// - Uppercase letters, digits and hyphens (`SAL-20260114-0001`)
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > 40 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 40,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only uppercase letters, digits and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns the most recent rows)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

fn validate_notes(notes: Option<&str>) -> ValidationResult<()> {
    match notes {
        Some(n) if n.len() > 1000 => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: 1000,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Example
/// ```rust
/// use torque_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());     // warranty replacement
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents. Zero and negative payments are
/// rejected; refunds are not payments.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a product reorder threshold.
pub fn validate_reorder_level(level: i64) -> ValidationResult<()> {
    if level < 0 {
        return Err(ValidationError::OutOfRange {
            field: "reorder_level".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Invoice Validators
// =============================================================================

/// Validates invoice lines and returns their total.
///
/// ## Rules
/// ```text
/// lines.len() ∈ 1..=MAX_INVOICE_LINES
/// ∀ line: product_id non-empty
///         quantity ∈ 1..=MAX_LINE_QUANTITY
///         unit_price ≥ 0
/// Σ quantity × unit_price fits in i64
/// ```
pub fn validate_lines(lines: &[InvoiceLine]) -> ValidationResult<Money> {
    if lines.is_empty() {
        return Err(ValidationError::Empty {
            field: "lines".to_string(),
        });
    }

    if lines.len() > MAX_INVOICE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_INVOICE_LINES as i64,
        });
    }

    let mut total = Money::zero();
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
        validate_price_cents(line.unit_price_cents)?;

        total = line
            .unit_price()
            .checked_multiply_quantity(line.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "total".to_string(),
                min: 0,
                max: i64::MAX,
            })?;
    }

    Ok(total)
}

/// Validates an invoice header for the given direction and returns the
/// effective sale type (`Some(REGULAR)` when a sale omits it, `None` for
/// purchases).
pub fn validate_header(
    direction: InvoiceDirection,
    header: &InvoiceHeader,
) -> ValidationResult<Option<SaleType>> {
    if header.counterparty_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "counterparty_id".to_string(),
        });
    }

    if header.store_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "store_id".to_string(),
        });
    }

    if let Some(code) = &header.code {
        validate_code(code)?;
    }

    validate_notes(header.notes.as_deref())?;

    match (direction, header.sale_type) {
        (InvoiceDirection::Sale, sale_type) => Ok(Some(sale_type.unwrap_or_default())),
        (InvoiceDirection::Purchase, None) => Ok(None),
        (InvoiceDirection::Purchase, Some(_)) => Err(ValidationError::NotAllowed {
            field: "sale_type".to_string(),
            allowed: vec!["(none on purchase invoices)".to_string()],
        }),
    }
}

/// Only PENDING and COMPLETED are valid initial statuses.
pub fn validate_initial_status(status: InvoiceStatus) -> ValidationResult<()> {
    match status {
        InvoiceStatus::Pending | InvoiceStatus::Completed => Ok(()),
        InvoiceStatus::Cancelled => Err(ValidationError::NotAllowed {
            field: "initial_status".to_string(),
            allowed: vec!["PENDING".to_string(), "COMPLETED".to_string()],
        }),
    }
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use torque_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
