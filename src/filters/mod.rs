//! Reusable filters.
//!
//! - [`StatsFilter`]: request, success and failure counters plus latency
//! - [`ResponseStatsFilter`]: per-status-code counters and latency for HTTP services
//! - [`TimeoutFilter`]: per-call deadline
//! - [`TraceFilter`]: span and outcome logging

pub mod response_stats;
pub mod stats;
pub mod timeout;
pub mod trace;

pub use response_stats::ResponseStatsFilter;
pub use stats::StatsFilter;
pub use timeout::TimeoutFilter;
pub use trace::TraceFilter;
