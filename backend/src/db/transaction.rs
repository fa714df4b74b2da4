use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{postgres::PgConnection, PgPool, Postgres, Transaction};
use std::time::{Duration, Instant};

use crate::transaction::TransactionalConnection;

/// A PostgreSQL transaction that keeps track of the time spent running
/// statements through it.
pub struct TimedTransaction {
    inner: Transaction<'static, Postgres>,
    elapsed: Duration,
}

impl TimedTransaction {
    /// Runs `query` against the transaction's connection and adds its wall
    /// time to [`TimedTransaction::elapsed`].
    pub async fn run<F, R>(&mut self, query: F) -> Result<R, sqlx::Error>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<R, sqlx::Error>>,
    {
        let started = Instant::now();
        let result = query(&mut *self.inner).await;
        self.elapsed += started.elapsed();
        result
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[async_trait]
impl TransactionalConnection for PgPool {
    type Transaction = TimedTransaction;

    async fn begin(&self) -> Result<TimedTransaction, sqlx::Error> {
        let started = Instant::now();
        let inner = sqlx::Pool::begin(self).await?;
        Ok(TimedTransaction {
            inner,
            elapsed: started.elapsed(),
        })
    }

    async fn commit(&self, tx: TimedTransaction) -> Result<(), sqlx::Error> {
        tx.inner.commit().await
    }

    async fn rollback(&self, tx: TimedTransaction) -> Result<(), sqlx::Error> {
        tx.inner.rollback().await
    }

    fn elapsed(&self, tx: &TimedTransaction) -> Duration {
        tx.elapsed
    }
}
