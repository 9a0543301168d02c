//! Structured logging around a service.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::Instrument;

use crate::context::Context;
use crate::error::Result;
use crate::http::RequestId;
use crate::service::{Filter, Next};

/// Opens a span named after the wrapped service and logs each outcome.
///
/// Successes and cancellations log at debug, other failures at warn.
#[derive(Debug, Clone)]
pub struct TraceFilter {
    name: Cow<'static, str>,
}

impl TraceFilter {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Filter for TraceFilter {
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        let request_id = RequestId::from_context(&ctx).map(|id| id.as_str().to_string());
        let span = tracing::debug_span!(
            "service",
            name = %self.name,
            request_id = request_id.as_deref().unwrap_or("-")
        );

        async move {
            let start = Instant::now();
            let result = next.run(ctx).await;
            let elapsed_ms = millis(start.elapsed());
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "Service completed"),
                Err(e) if e.is_context() => tracing::debug!(elapsed_ms, error = %e, "Service cancelled"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "Service failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
