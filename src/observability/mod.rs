//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Filters / endpoint / client produce:
//!     → logging.rs (structured tracing events)
//!     → stats.rs   (StatsReceiver: counters, timers, scopes)
//!         → metrics.rs (global `metrics` recorder, Prometheus scrape)
//!         → memory.rs  (in-process registry, readable back)
//! ```
//!
//! # Design Decisions
//! - Filters depend only on the `StatsReceiver` interface
//! - Metric updates are cheap (atomics / facade handles)
//! - Request ID flows through the context into log fields

pub mod logging;
pub mod memory;
pub mod metrics;
pub mod stats;

pub use self::logging::init_logging;
pub use self::memory::InMemoryStats;
pub use self::metrics::{init_metrics, MetricsReceiver};
pub use self::stats::{Counter, StatsReceiver, Timer};
