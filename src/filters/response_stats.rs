//! Per-status-code counters and latencies for HTTP services.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::context::Context;
use crate::error::Result;
use crate::http::endpoint::failure_status;
use crate::http::HttpExchange;
use crate::observability::StatsReceiver;
use crate::service::{Filter, Next};

/// Counts responses under `http.status.<code>` and `http.status.<class>`
/// and times them under `http.time.<code>` and `http.time.<class>`,
/// where class is `2xx`, `4xx` and so on.
///
/// Only valid on services invoked by an [`Endpoint`](crate::http::Endpoint):
/// the status is read from the exchange in the context.
pub struct ResponseStatsFilter {
    status: Arc<dyn StatsReceiver>,
    time: Arc<dyn StatsReceiver>,
}

impl ResponseStatsFilter {
    pub fn new(stats: &dyn StatsReceiver) -> Self {
        let http = stats.scope("http");
        Self {
            status: http.scope("status"),
            time: http.scope("time"),
        }
    }
}

#[async_trait]
impl Filter for ResponseStatsFilter {
    async fn call(&self, ctx: Context, next: Next) -> Result<()> {
        let start = Instant::now();
        let result = next.run(ctx.clone()).await;
        let latency = start.elapsed();

        let writer = HttpExchange::from_context(&ctx).response();
        let status = match &result {
            Err(e) => failure_status(writer, e),
            Ok(()) => writer.status(),
        };

        let code = status.as_u16().to_string();
        let class = status_class(status);
        for name in [code.as_str(), class.as_str()] {
            self.status.counter(name).incr();
            self.time.timer(name).add(latency);
        }

        result
    }
}

fn status_class(status: StatusCode) -> String {
    format!("{}xx", status.as_u16() / 100)
}
