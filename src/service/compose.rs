//! Filter composition: `apply` and `chain`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{BoxFilter, BoxService, Filter, Next, Service};
use crate::context::Context;
use crate::error::Result;

/// A filter bound to its downstream service.
struct Filtered {
    filter: BoxFilter,
    next: BoxService,
}

#[async_trait]
impl Service for Filtered {
    async fn call(&self, ctx: Context) -> Result<()> {
        self.filter.call(ctx, Next::new(Arc::clone(&self.next))).await
    }
}

/// Wrap `service` with `filters`; the first filter is the outermost.
///
/// Built by folding from the innermost filter outward, so long filter
/// lists do not recurse during composition.
pub fn apply<I>(service: BoxService, filters: I) -> BoxService
where
    I: IntoIterator<Item = BoxFilter>,
{
    let filters: Vec<BoxFilter> = filters.into_iter().collect();
    filters.into_iter().rev().fold(service, |next, filter| {
        Arc::new(Filtered { filter, next }) as BoxService
    })
}

/// Combine filters into one; see [`Chain`].
pub fn chain<I>(filters: I) -> Chain
where
    I: IntoIterator<Item = BoxFilter>,
{
    Chain::new(filters)
}

/// Several filters acting as one.
///
/// The first filter is the outermost and the last one directly wraps
/// the service the chain is eventually invoked with. An empty chain
/// passes straight through to `next`.
#[derive(Clone, Default)]
pub struct Chain {
    filters: Vec<BoxFilter>,
}

impl Chain {
    pub fn new<I>(filters: I) -> Self
    where
        I: IntoIterator<Item = BoxFilter>,
    {
        Self {
            filters: filters.into_iter().collect(),
        }
    }

    /// Add a filter inside the ones already present.
    pub fn push<F>(mut self, filter: F) -> Self
    where
        F: Filter + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Concatenate two chains; `inner` runs inside `self`.
    pub fn append(mut self, inner: Chain) -> Self {
        self.filters.extend(inner.filters);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Wrap a terminal service with this chain.
    pub fn service(&self, service: BoxService) -> BoxService {
        apply(service, self.filters.iter().cloned())
    }
}

#[async_trait]
impl Filter for Chain {
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        self.service(next.into_service()).call(ctx).await
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.filters.len()).finish()
    }
}

/// Combinators available on every service.
pub trait ServiceExt: Service + Sized + 'static {
    /// Erase the concrete type.
    fn boxed(self) -> BoxService {
        Arc::new(self)
    }

    /// Wrap this service with `filters`, first filter outermost.
    fn with_filters<I>(self, filters: I) -> BoxService
    where
        I: IntoIterator<Item = BoxFilter>,
    {
        apply(Arc::new(self), filters)
    }
}

impl<S> ServiceExt for S where S: Service + Sized + 'static {}

/// Combinators available on every filter.
pub trait FilterExt: Filter + Sized + 'static {
    /// Erase the concrete type.
    fn boxed(self) -> BoxFilter {
        Arc::new(self)
    }

    /// Run `inner` inside this filter.
    fn then<F>(self, inner: F) -> Chain
    where
        F: Filter + 'static,
    {
        Chain::new([Arc::new(self) as BoxFilter]).push(inner)
    }
}

impl<F> FilterExt for F where F: Filter + Sized + 'static {}
