//! Store error model and SQLx error mapping.
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database (unique violation) | `Domain(Conflict)` |
//! | Database (foreign key violation) | `Domain(Validation)` |
//! | Database (check constraint violation) | `Domain(Validation)` |
//! | Database (other) | `Database` |
//! | PoolClosed, RowNotFound, other | `Database` |

use labstock_core::DomainError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A deterministic business failure (not found, in use, conflict, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Unexpected store failure. Never retried.
    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Filesystem failure in the blob store.
    #[error("io error in {operation}: {message}")]
    Io {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn database(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Database {
            operation,
            message: message.into(),
        }
    }

    pub fn io(operation: &'static str, err: std::io::Error) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }

    /// The domain error, if this is a business failure.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            StoreError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                DomainError::conflict(format!("duplicate value in {operation}")).into()
            } else if db_err.is_foreign_key_violation() {
                DomainError::validation("referenced record does not exist").into()
            } else if db_err.is_check_violation() {
                DomainError::validation(format!("constraint rejected value in {operation}")).into()
            } else {
                StoreError::database(operation, db_err.message())
            }
        }
        sqlx::Error::PoolClosed => StoreError::database(operation, "connection pool closed"),
        sqlx::Error::RowNotFound => StoreError::database(operation, "unexpected row not found"),
        other => StoreError::database(operation, other.to_string()),
    }
}

/// Check if an error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Map a unique violation on a name column to a readable conflict.
pub(crate) fn map_name_conflict(
    operation: &'static str,
    entity: &'static str,
    name: &str,
) -> impl FnOnce(sqlx::Error) -> StoreError {
    let name = name.to_string();
    move |err| {
        if is_unique_violation(&err) {
            DomainError::conflict(format!("{entity} '{name}' already exists")).into()
        } else {
            map_sqlx_error(operation, err)
        }
    }
}
