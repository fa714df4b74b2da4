use crate::error::AppError;

/// Failure of a request-scoped transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("failed to begin transaction")]
    Begin(#[source] sqlx::Error),

    #[error("failed to commit transaction")]
    Commit(#[source] sqlx::Error),

    /// The handler failed and the rollback failed too. The handler error is
    /// kept for diagnostics but is no longer the root cause.
    #[error("failed to roll back transaction")]
    Rollback {
        #[source]
        source: sqlx::Error,
        cause: AppError,
    },

    #[error("transaction rolled back")]
    RolledBack(#[source] AppError),

    #[error("transaction was taken out of its handle before it could be finished")]
    Detached,
}

impl TransactionError {
    /// The HTTP-facing error at the root of this failure, if there is one.
    pub fn http_cause(&self) -> Option<&AppError> {
        match self {
            TransactionError::RolledBack(err) if err.is_http_facing() => Some(err),
            _ => None,
        }
    }
}

impl From<TransactionError> for AppError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::RolledBack(cause) if cause.is_http_facing() => cause,
            other => AppError::InternalServerError(anyhow::Error::new(other)),
        }
    }
}
