//! Metrics sink interface consumed by filters.
//!
//! Implementations own their own synchronization: handles are shared
//! between concurrent invocations and must tolerate concurrent updates.

use std::sync::Arc;
use std::time::Duration;

/// A monotonically increasing count.
pub trait Counter: Send + Sync {
    fn incr(&self) {
        self.add(1);
    }

    fn add(&self, n: u64);
}

/// A distribution of durations.
pub trait Timer: Send + Sync {
    fn add(&self, elapsed: Duration);
}

/// Factory for named metric handles.
pub trait StatsReceiver: Send + Sync {
    fn counter(&self, name: &str) -> Arc<dyn Counter>;

    fn timer(&self, name: &str) -> Arc<dyn Timer>;

    /// A receiver whose names are prefixed with `prefix`.
    fn scope(&self, prefix: &str) -> Arc<dyn StatsReceiver>;
}

/// Join a scope prefix and a metric name.
pub(crate) fn scoped_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
