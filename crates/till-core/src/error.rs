//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                           │
//! │  ├── CoreError        - Failures of the pure checkout/stock rules       │
//! │  └── ValidationError  - Malformed input                                 │
//! │                                                                         │
//! │  till-db errors (separate crate)                                        │
//! │  └── DbError          - Store failures (retryable or not)               │
//! │                                                                         │
//! │  till-register errors                                                   │
//! │  └── RegisterError    - Flat taxonomy returned to callers               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                   │
//! │                          DbError ───┴──► RegisterError → caller         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, amounts)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Produced by the pure passes (cart validation, tender resolution, stock
/// arithmetic). Nothing has been mutated when one of these is returned.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product code is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete the operation.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 1001 × 5
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "1001", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Cashier sees: "Only 3 of 1001 in stock"
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// The tendered amount does not settle the total.
    ///
    /// ## When This Occurs
    /// - Single tender below the total
    /// - Mixed tender whose parts do not sum to the total exactly
    #[error("Tendered {tendered} does not match total {total}")]
    AmountMismatch { total: Money, tendered: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Arithmetic on the value would overflow.
    #[error("{field} would overflow")]
    Overflow { field: String },

    /// Invalid format (e.g., control characters in a code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,
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
            code: "7801234".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for 7801234: available 3, requested 5"
        );

        let err = CoreError::AmountMismatch {
            total: Money::from_units(1000),
            tendered: Money::from_units(900),
        };
        assert_eq!(err.to_string(), "Tendered $900 does not match total $1.000");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "code".to_string(),
        };
        assert_eq!(err.to_string(), "code is required");
        assert_eq!(ValidationError::EmptyCart.to_string(), "Cart is empty");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::EmptyCart.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
