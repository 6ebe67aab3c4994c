//! # Register Error Type
//!
//! The one error type callers of the register services see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Till POS                               │
//! │                                                                         │
//! │  till-core                   till-db                                    │
//! │  ─────────                   ───────                                    │
//! │  CoreError::Validation       DbError::NotFound                          │
//! │  CoreError::InsufficientStock DbError::Conflict                         │
//! │  CoreError::AmountMismatch   DbError::Busy ──► retried, then Io         │
//! │        │                          │                                     │
//! │        └────────────┬─────────────┘                                     │
//! │                     ▼                                                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  RegisterError                                                   │  │
//! │  │  Validation │ NotFound │ InsufficientStock │ SessionAlreadyOpen  │  │
//! │  │  NoOpenSession │ AmountMismatch │ Conflict │ Io                  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  caller: match on the variant, or on err.code() for a stable string     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;
use till_core::{CoreError, Money, ValidationError};
use till_db::DbError;

/// Result type alias for register operations.
pub type RegisterResult<T> = Result<T, RegisterError>;

/// Everything a ledger, session or checkout call can fail with.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Malformed input: non-positive quantity, empty cart, blank user...
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown product or session.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    #[error("User {user} already has an open cash session")]
    SessionAlreadyOpen { user: String },

    #[error("User {user} has no open cash session")]
    NoOpenSession { user: String },

    /// Tender does not settle the total.
    #[error("Tendered {tendered} does not match total {total}")]
    AmountMismatch { total: Money, tendered: Money },

    /// A concurrent mutation invalidated an earlier check. The caller may
    /// retry the whole operation.
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    /// The backing store is unavailable (after retries) or failed.
    #[error("Storage failure: {0}")]
    Io(String),
}

/// Machine-readable error codes.
///
/// ```text
/// NOT_FOUND            unknown product / session
/// VALIDATION_ERROR     malformed input
/// INSUFFICIENT_STOCK   exit larger than stock
/// SESSION_ALREADY_OPEN open() twice
/// NO_OPEN_SESSION      close() / checkout without open()
/// AMOUNT_MISMATCH      tender ≠ total
/// CONFLICT             retry the operation
/// IO_FAILURE           store unavailable
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    InsufficientStock,
    SessionAlreadyOpen,
    NoOpenSession,
    AmountMismatch,
    Conflict,
    IoFailure,
}

impl RegisterError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        RegisterError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        RegisterError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RegisterError::Validation(_) => ErrorCode::ValidationError,
            RegisterError::NotFound { .. } => ErrorCode::NotFound,
            RegisterError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            RegisterError::SessionAlreadyOpen { .. } => ErrorCode::SessionAlreadyOpen,
            RegisterError::NoOpenSession { .. } => ErrorCode::NoOpenSession,
            RegisterError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
            RegisterError::Conflict { .. } => ErrorCode::Conflict,
            RegisterError::Io(_) => ErrorCode::IoFailure,
        }
    }

    /// True when repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegisterError::Conflict { .. } | RegisterError::Io(_))
    }
}

/// Converts core errors to register errors.
impl From<CoreError> for RegisterError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(code) => RegisterError::not_found("Product", code),
            CoreError::InsufficientStock {
                code,
                available,
                requested,
            } => RegisterError::InsufficientStock {
                code,
                available,
                requested,
            },
            CoreError::AmountMismatch { total, tendered } => {
                RegisterError::AmountMismatch { total, tendered }
            }
            CoreError::Validation(e) => RegisterError::Validation(e),
        }
    }
}

/// Converts store errors to register errors.
///
/// Transient failures reach this point only once the retry policy has
/// given up on them.
impl From<DbError> for RegisterError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => RegisterError::NotFound { entity, id },
            DbError::Invalid(e) => RegisterError::Validation(e),
            DbError::Conflict { entity, id } => RegisterError::Conflict { entity, id },
            DbError::UniqueViolation { field, value } => RegisterError::Conflict {
                entity: field,
                id: value,
            },
            DbError::ForeignKeyViolation { message } => {
                tracing::error!(%message, "Foreign key violation");
                RegisterError::not_found("Reference", message)
            }
            other => {
                if !other.is_retryable() {
                    tracing::error!(error = %other, "Store operation failed");
                }
                RegisterError::Io(other.to_string())
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
