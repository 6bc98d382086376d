use thiserror::Error;

/// Storage-layer failures.
///
/// `Conflict` and `NotFound` are expected outcomes that callers map into the
/// domain taxonomy; `Backend` is anything else (connection loss, poisoned
/// lock, unexpected row shape) and surfaces as an internal error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Map SQLx errors, tagging the message with the failing operation.
///
/// | SQLx error | PostgreSQL code | StoreError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `Conflict` |
/// | Database (foreign key violation) | `23503` | `NotFound` |
/// | RowNotFound | n/a | `NotFound` |
/// | anything else | n/a | `Backend` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(
                    db_err.constraint().map(str::to_string).unwrap_or(msg),
                ),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("{operation}: row not found")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("{operation}: connection pool closed"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
