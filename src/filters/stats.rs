//! Request latency and outcome counters.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::observability::{Counter, StatsReceiver, Timer};
use crate::service::{Filter, Next};

/// Records `requests`, `success`, `failure` and `latency` for every call.
///
/// Purely observational: the downstream result is returned untouched.
pub struct StatsFilter {
    requests: Arc<dyn Counter>,
    success: Arc<dyn Counter>,
    failure: Arc<dyn Counter>,
    latency: Arc<dyn Timer>,
}

impl StatsFilter {
    pub fn new(stats: &dyn StatsReceiver) -> Self {
        Self {
            requests: stats.counter("requests"),
            success: stats.counter("success"),
            failure: stats.counter("failure"),
            latency: stats.timer("latency"),
        }
    }
}

#[async_trait]
impl Filter for StatsFilter {
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        let start = Instant::now();
        let result = next.run(ctx).await;
        let latency = start.elapsed();

        self.requests.incr();
        self.latency.add(latency);
        match result {
            Ok(()) => self.success.incr(),
            Err(_) => self.failure.incr(),
        }

        result
    }
}
