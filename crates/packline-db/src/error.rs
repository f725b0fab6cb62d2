//! # Database and Engine Errors
//!
//! Error types for store access and for the operations built on top of it.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Error Propagation                                  │
//! │                                                                         │
//! │  SQLite ──► sqlx::Error ──► DbError ─────────┐                         │
//! │                                              ├──► EngineError ──► UI   │
//! │  packline_core::rules ──► CoreError ─────────┘                         │
//! │                                                                         │
//! │  EngineError::Rule   operator mistake, state untouched, retry freely   │
//! │  EngineError::Store  infrastructure problem, state untouched           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use packline_core::{CoreError, ValidationError};
use thiserror::Error;

// =============================================================================
// Store Error
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (number, code or sequence index taken).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The store could not be reached (pool timeout, closed pool, I/O).
    ///
    /// Nothing was written; the caller may retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Commit failed; the transaction was rolled back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A stored value could not be decoded (unknown status string, bad
    /// setting). Never silently mapped to a default.
    #[error("Corrupt {entity}.{field}: '{value}'")]
    Corrupt {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// A value handed to the store was rejected before it was written.
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

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

    pub fn corrupt(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        DbError::Corrupt {
            entity,
            field,
            value: value.into(),
        }
    }

    /// Wraps a failed commit.
    pub fn transaction(err: sqlx::Error) -> Self {
        match DbError::from(err) {
            DbError::StoreUnavailable(msg) => DbError::StoreUnavailable(msg),
            other => DbError::TransactionFailed(other.to_string()),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::StoreUnavailable
/// sqlx::Error::PoolClosed     → DbError::StoreUnavailable
/// sqlx::Error::Io             → DbError::StoreUnavailable
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

                // "UNIQUE constraint failed: packages.package_number"
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
                } else if msg.contains("database is locked") {
                    DbError::StoreUnavailable(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::StoreUnavailable("Connection pool timed out".to_string())
            }

            sqlx::Error::PoolClosed => DbError::StoreUnavailable("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::StoreUnavailable(io.to_string()),

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

// =============================================================================
// Engine Error
// =============================================================================

/// What lifecycle, scan and undo operations return.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Rule(#[from] CoreError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] DbError),

    /// An operation payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// True for operator-correctable failures (bad scan, wrong state, ...).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Rule(_) | EngineError::Store(DbError::Invalid(_)))
    }

    /// The business-rule error, if that is what this is.
    pub fn as_rule(&self) -> Option<&CoreError> {
        match self {
            EngineError::Rule(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Store(err.into())
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Rule(err.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_store_unavailable() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::StoreUnavailable(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn test_rule_errors_are_recoverable() {
        let err: EngineError = CoreError::InvalidScan("1234".to_string()).into();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Invalid scan: no component with code '1234'");

        let err: EngineError = DbError::StoreUnavailable("down".to_string()).into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_validation_becomes_rule() {
        let err: EngineError = ValidationError::Required {
            field: "cargo name".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Rule(CoreError::Validation(_))));
    }

    #[test]
    fn test_rejected_input_is_recoverable() {
        let err: EngineError = DbError::from(ValidationError::MustBePositive {
            field: "strip_prefix.n".to_string(),
        })
        .into();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Invalid input: strip_prefix.n must be positive");
    }
}
