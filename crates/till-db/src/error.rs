//! # Database Error Types
//!
//! Error types for store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        in-memory store                      │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ├── is_retryable()? ──► retried by till-register with backoff     │
//! │       ▼                                                                 │
//! │  RegisterError (till-register) ← What callers see                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use till_core::ValidationError;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate product code
    /// - Duplicate receipt number
    /// - Opening a second OPEN session for the same user
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row failed domain validation before it reached storage.
    ///
    /// ## When This Occurs
    /// - Inserting a product with an empty name, negative price or stock
    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A compare-and-set write found the row changed.
    ///
    /// ## When This Occurs
    /// - `update_stock` with an `expected` stock that no longer matches
    /// - Closing a session that is no longer OPEN
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The database is locked by another writer (SQLITE_BUSY).
    #[error("Database busy: {0}")]
    Busy(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded into a domain type.
    #[error("Corrupt {field}: {reason}")]
    Decode { field: String, reason: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Decode error.
    pub fn decode(field: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Decode {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the operation may succeed when repeated unchanged.
    ///
    /// Constraint violations and conflicts are answers, not outages, and
    /// are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionFailed(_) | DbError::Busy(_) | DbError::PoolExhausted
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type / busy
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // SQLITE_BUSY: "database is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(DbError::ConnectionFailed("gone".into()).is_retryable());

        assert!(!DbError::conflict("Product", "1001").is_retryable());
        assert!(!DbError::duplicate("code", "1001").is_retryable());
        assert!(!DbError::not_found("Product", "1001").is_retryable());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            DbError::conflict("Product", "1001").to_string(),
            "Concurrent modification of Product 1001"
        );
        assert_eq!(
            DbError::duplicate("code", "1001").to_string(),
            "Duplicate code: '1001' already exists"
        );
    }
}
