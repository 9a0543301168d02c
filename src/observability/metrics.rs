//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Adapt the `metrics` facade to the [`StatsReceiver`] interface
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Design Decisions
//! - Handles are resolved against the global recorder when created, so
//!   `init_metrics` must run before filters are built
//! - Timers are histograms in seconds
//! - Metric names are the scoped names joined with `.`, prefixed by the
//!   configured root prefix

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use super::stats::{scoped_name, Counter, StatsReceiver, Timer};

/// Install the global Prometheus recorder and its HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// [`StatsReceiver`] backed by the global `metrics` recorder.
#[derive(Debug, Clone, Default)]
pub struct MetricsReceiver {
    prefix: String,
}

impl MetricsReceiver {
    /// Receiver whose metric names all start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl StatsReceiver for MetricsReceiver {
    fn counter(&self, name: &str) -> Arc<dyn Counter> {
        let counter = metrics::counter!(scoped_name(&self.prefix, name));
        Arc::new(FacadeCounter(counter))
    }

    fn timer(&self, name: &str) -> Arc<dyn Timer> {
        let histogram = metrics::histogram!(scoped_name(&self.prefix, name));
        Arc::new(FacadeTimer(histogram))
    }

    fn scope(&self, prefix: &str) -> Arc<dyn StatsReceiver> {
        Arc::new(MetricsReceiver::new(scoped_name(&self.prefix, prefix)))
    }
}

struct FacadeCounter(metrics::Counter);

impl Counter for FacadeCounter {
    fn add(&self, n: u64) {
        self.0.increment(n);
    }
}

struct FacadeTimer(metrics::Histogram);

impl Timer for FacadeTimer {
    fn add(&self, elapsed: Duration) {
        self.0.record(elapsed.as_secs_f64());
    }
}
