//! In-process stats receiver.
//!
//! Keeps every counter and timer sample in memory so they can be read
//! back. Used by tests and by embedders that export metrics themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;

use super::stats::{scoped_name, Counter, StatsReceiver, Timer};

#[derive(Default)]
struct Registry {
    counters: DashMap<String, Arc<MemoryCounter>>,
    timers: DashMap<String, Arc<MemoryTimer>>,
}

/// Thread-safe in-memory [`StatsReceiver`].
///
/// Clones and scopes share the same registry.
#[derive(Clone, Default)]
pub struct InMemoryStats {
    registry: Arc<Registry>,
    prefix: String,
}

impl InMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter by its full name; 0 if never created.
    pub fn counter_value(&self, name: &str) -> u64 {
        self.registry
            .counters
            .get(name)
            .map(|c| c.value.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All samples recorded by a timer, by its full name.
    pub fn timer_samples(&self, name: &str) -> Vec<Duration> {
        self.registry
            .timers
            .get(name)
            .map(|t| t.samples.lock().expect("timer mutex poisoned").clone())
            .unwrap_or_default()
    }

    /// Full names of every counter created so far, sorted.
    pub fn counter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.counters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl StatsReceiver for InMemoryStats {
    fn counter(&self, name: &str) -> Arc<dyn Counter> {
        let full = scoped_name(&self.prefix, name);
        let counter = self.registry.counters.entry(full).or_default().clone();
        counter
    }

    fn timer(&self, name: &str) -> Arc<dyn Timer> {
        let full = scoped_name(&self.prefix, name);
        let timer = self.registry.timers.entry(full).or_default().clone();
        timer
    }

    fn scope(&self, prefix: &str) -> Arc<dyn StatsReceiver> {
        Arc::new(Self {
            registry: Arc::clone(&self.registry),
            prefix: scoped_name(&self.prefix, prefix),
        })
    }
}

#[derive(Default)]
struct MemoryCounter {
    value: AtomicU64,
}

impl Counter for MemoryCounter {
    fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct MemoryTimer {
    samples: Mutex<Vec<Duration>>,
}

impl Timer for MemoryTimer {
    fn add(&self, elapsed: Duration) {
        self.samples.lock().expect("timer mutex poisoned").push(elapsed);
    }
}
