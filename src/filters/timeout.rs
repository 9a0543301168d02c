//! Deadline filter.

use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::service::{Filter, Next};

/// Runs downstream under a child context that expires after `timeout`.
///
/// The deadline is cooperative: downstream sees it through
/// [`Context::err`] and [`Context::done`], and [`execute`](crate::client::execute)
/// enforces it around cancellable operations. A parent deadline that is
/// earlier still wins.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutFilter {
    timeout: Duration,
}

impl TimeoutFilter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Filter for TimeoutFilter {
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        let (child, _release) = Context::with_timeout(&ctx, self.timeout);
        next.run(child).await
    }
}
