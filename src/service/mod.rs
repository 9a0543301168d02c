//! Service/Filter core.
//!
//! # Data Flow
//! ```text
//! apply(T, [A, B, C]).call(ctx)
//!     → A before → B before → C before
//!         → T
//!     → C after → B after → A after
//! ```
//!
//! # Design Decisions
//! - A chain runs on the caller's task; no implicit concurrency
//! - `Next` is consumed when run, so a filter calls downstream at most once
//! - Dropping `Next` without running it short-circuits the rest of the chain
//! - Composition only builds values; side effects happen when invoked

mod compose;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;

pub use compose::{apply, chain, Chain, FilterExt, ServiceExt};

/// A single asynchronous operation run under a [`Context`].
#[async_trait]
pub trait Service: Send + Sync {
    async fn call(&self, ctx: Context) -> Result<()>;
}

/// Wraps a downstream [`Service`] to add behavior around it.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Run the filter. `next` may be run once or not at all.
    async fn call(&self, ctx: Context, next: Next) -> Result<()>;
}

/// Shared, type-erased service.
pub type BoxService = Arc<dyn Service>;

/// Shared, type-erased filter.
pub type BoxFilter = Arc<dyn Filter>;

/// The downstream part of a chain as seen by one filter invocation.
pub struct Next {
    inner: BoxService,
}

impl Next {
    pub fn new(inner: BoxService) -> Self {
        Self { inner }
    }

    /// Invoke the downstream service, consuming the handle.
    pub async fn run(self, ctx: Context) -> Result<()> {
        self.inner.call(ctx).await
    }

    pub(crate) fn into_service(self) -> BoxService {
        self.inner
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> Service for Arc<S>
where
    S: Service + ?Sized,
{
    async fn call(&self, ctx: Context) -> Result<()> {
        (**self).call(ctx).await
    }
}

#[async_trait]
impl<S> Service for Box<S>
where
    S: Service + ?Sized,
{
    async fn call(&self, ctx: Context) -> Result<()> {
        (**self).call(ctx).await
    }
}

#[async_trait]
impl<F> Filter for Arc<F>
where
    F: Filter + ?Sized,
{
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        (**self).call(ctx, next).await
    }
}

/// Service that always succeeds without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopService;

#[async_trait]
impl Service for NoopService {
    async fn call(&self, _ctx: Context) -> Result<()> {
        Ok(())
    }
}

/// Service built from a closure; see [`service_fn`].
#[derive(Clone)]
pub struct ServiceFn<F> {
    f: F,
}

/// Create a [`Service`] from an async closure.
pub fn service_fn<F, Fut>(f: F) -> ServiceFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    ServiceFn { f }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: Context) -> Result<()> {
        (self.f)(ctx).await
    }
}

/// Filter built from a closure; see [`filter_fn`].
#[derive(Clone)]
pub struct FilterFn<F> {
    f: F,
}

/// Create a [`Filter`] from an async closure.
pub fn filter_fn<F, Fut>(f: F) -> FilterFn<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FilterFn { f }
}

#[async_trait]
impl<F, Fut> Filter for FilterFn<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        (self.f)(ctx, next).await
    }
}
