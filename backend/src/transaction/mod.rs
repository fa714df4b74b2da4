//! Request-scoped database transactions.
//!
//! [`TransactionWrapper`] wraps a [`Handler`] so that every call runs inside a
//! fresh transaction: the transaction is committed when the handler returns
//! `Ok`, rolled back when it returns `Err` or panics, and the database time
//! spent during the call is recorded in the request's [`LogFields`] under
//! [`DB_LOG_FIELD`].
//!
//! ```ignore
//! let wrapper = TransactionWrapper::new(pool);
//! let handler = wrapper.wrap(handler_fn(|ctx: RequestContext<TimedTransaction>| async move {
//!     let mut tx = ctx.transaction().await?;
//!     tx.run(|conn| Box::pin(async move {
//!         sqlx::query("INSERT INTO widgets DEFAULT VALUES").execute(conn).await
//!     }))
//!     .await?;
//!     Ok(())
//! }));
//! handler.call(RequestContext::default()).await?;
//! ```

mod context;
mod error;
mod handler;

use async_trait::async_trait;
use futures::FutureExt;
use std::{future::Future, panic::AssertUnwindSafe, time::Duration};

pub use context::{LogFields, RequestContext, Tx};
pub use error::TransactionError;
pub use handler::{handler_fn, Handler, HandlerFn, Wrapped};

use crate::error::AppError;

/// Log field holding the time spent in database calls during the request.
pub const DB_LOG_FIELD: &str = "db";

/// A database connection that can run request-scoped transactions.
#[cfg_attr(test, mockall::automock(type Transaction = u32;))]
#[async_trait]
pub trait TransactionalConnection: Send + Sync + 'static {
    type Transaction: Send + 'static;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error>;

    async fn commit(&self, tx: Self::Transaction) -> Result<(), sqlx::Error>;

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), sqlx::Error>;

    /// Cumulative time the transaction has spent in database calls.
    fn elapsed(&self, tx: &Self::Transaction) -> Duration;
}

#[derive(Clone)]
pub struct TransactionWrapper<C> {
    connection: C,
}

impl<C: TransactionalConnection> TransactionWrapper<C> {
    pub fn new(connection: C) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Wraps `handler` so each call runs in its own transaction.
    pub fn wrap<H>(&self, handler: H) -> Wrapped<C, H>
    where
        C: Clone,
        H: Handler<C::Transaction>,
    {
        Wrapped::new(self.clone(), handler)
    }

    /// Runs `body` inside a new transaction bound to a copy of `ctx`.
    ///
    /// Errors whose root cause is HTTP-facing are returned unwrapped; every
    /// other failure comes back as [`AppError::InternalServerError`] wrapping
    /// the [`TransactionError`].
    pub async fn scope<F, Fut, R>(
        &self,
        ctx: &RequestContext<C::Transaction>,
        body: F,
    ) -> Result<R, AppError>
    where
        F: FnOnce(RequestContext<C::Transaction>) -> Fut + Send,
        Fut: Future<Output = Result<R, AppError>> + Send,
        R: Send,
    {
        self.run(ctx, body).await.map_err(AppError::from)
    }

    async fn run<F, Fut, R>(
        &self,
        ctx: &RequestContext<C::Transaction>,
        body: F,
    ) -> Result<R, TransactionError>
    where
        F: FnOnce(RequestContext<C::Transaction>) -> Fut + Send,
        Fut: Future<Output = Result<R, AppError>> + Send,
        R: Send,
    {
        let tx = self
            .connection
            .begin()
            .await
            .map_err(TransactionError::Begin)?;
        let start = self.connection.elapsed(&tx);
        tracing::debug!("Transaction started");

        let handle = Tx::new(tx);
        let scoped = ctx.with_transaction(handle.clone());
        let outcome = AssertUnwindSafe(async move { body(scoped).await })
            .catch_unwind()
            .await;

        let Some(tx) = handle.take().await else {
            tracing::error!("Transaction handle was emptied before the wrapper finished it");
            if let Err(panic) = outcome {
                std::panic::resume_unwind(panic);
            }
            return Err(TransactionError::Detached);
        };

        let finish = self.connection.elapsed(&tx);
        let db = finish.saturating_sub(start);
        ctx.log_fields().set_duration(DB_LOG_FIELD, db);

        match outcome {
            Ok(Ok(value)) => {
                self.connection
                    .commit(tx)
                    .await
                    .map_err(TransactionError::Commit)?;
                tracing::debug!(db_ms = db.as_secs_f64() * 1000.0, "Transaction committed");
                Ok(value)
            }
            Ok(Err(cause)) => match self.connection.rollback(tx).await {
                Ok(()) => {
                    tracing::debug!(
                        db_ms = db.as_secs_f64() * 1000.0,
                        error = %cause,
                        "Transaction rolled back"
                    );
                    Err(TransactionError::RolledBack(cause))
                }
                Err(source) => {
                    tracing::warn!(error = ?source, cause = %cause, "Transaction rollback failed");
                    Err(TransactionError::Rollback { source, cause })
                }
            },
            Err(panic) => {
                if let Err(err) = self.connection.rollback(tx).await {
                    tracing::error!(error = ?err, "Rollback after handler panic failed");
                } else {
                    tracing::debug!("Transaction rolled back after handler panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
