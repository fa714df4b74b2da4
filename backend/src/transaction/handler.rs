use async_trait::async_trait;
use std::future::Future;

use super::{RequestContext, TransactionWrapper, TransactionalConnection};
use crate::error::AppError;

/// A unit of request-processing logic.
#[async_trait]
pub trait Handler<T>: Send + Sync {
    async fn call(&self, ctx: RequestContext<T>) -> Result<(), AppError>;
}

/// Handler built from an async closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<T, F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(RequestContext<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<T, F, Fut> Handler<T> for HandlerFn<F>
where
    T: Send + 'static,
    F: Fn(RequestContext<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    async fn call(&self, ctx: RequestContext<T>) -> Result<(), AppError> {
        (self.f)(ctx).await
    }
}

/// Handler produced by [`TransactionWrapper::wrap`].
#[derive(Clone)]
pub struct Wrapped<C, H> {
    wrapper: TransactionWrapper<C>,
    inner: H,
}

impl<C, H> Wrapped<C, H> {
    pub(crate) fn new(wrapper: TransactionWrapper<C>, inner: H) -> Self {
        Self { wrapper, inner }
    }
}

#[async_trait]
impl<C, H> Handler<C::Transaction> for Wrapped<C, H>
where
    C: TransactionalConnection,
    H: Handler<C::Transaction>,
{
    async fn call(&self, ctx: RequestContext<C::Transaction>) -> Result<(), AppError> {
        self.wrapper
            .scope(&ctx, |ctx| self.inner.call(ctx))
            .await
    }
}
