//! Store error taxonomy (spec.md §4.1, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent writer already created the resource this call was
    /// trying to create — e.g. two frames racing to open the same
    /// `(device_id, parameter)` alert. Callers should fall back to the
    /// update path (spec.md §4.1).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Retryable: connection pool exhaustion, timeout, deadlock.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Not retryable: constraint violation other than the alert
    /// uniqueness index, malformed data, schema mismatch.
    #[error("permanent store error: {0}")]
    Permanent(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Transient(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(err.to_string())
            }
            _ => StoreError::Permanent(err.to_string()),
        }
    }
}
