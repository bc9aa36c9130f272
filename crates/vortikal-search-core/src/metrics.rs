//! Lock-free searcher counters
//!
//! Recording is a relaxed atomic add; `snapshot()` loads every counter into
//! a serializable struct.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Counter {
    v: AtomicU64,
}

impl Counter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            v: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc(&self) {
        self.v.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, delta: u64) {
        self.v.fetch_add(delta, Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self) -> u64 {
        self.v.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fetch_max(&self, value: u64) {
        self.v.fetch_max(value, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct SearcherMetrics {
    pub executions_total: Counter,
    pub iterations_total: Counter,
    pub errors_total: Counter,
    /// Stored documents read and turned into property-sets
    pub documents_loaded_total: Counter,
    /// Property-sets handed to iteration callbacks
    pub matches_delivered_total: Counter,
    pub slow_queries_total: Counter,
    pub latency_us_total: Counter,
    pub latency_us_max: Counter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearcherMetricsSnapshot {
    pub executions_total: u64,
    pub iterations_total: u64,
    pub errors_total: u64,
    pub documents_loaded_total: u64,
    pub matches_delivered_total: u64,
    pub slow_queries_total: u64,
    pub latency_us_total: u64,
    pub latency_us_max: u64,
}

impl SearcherMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            executions_total: Counter::new(),
            iterations_total: Counter::new(),
            errors_total: Counter::new(),
            documents_loaded_total: Counter::new(),
            matches_delivered_total: Counter::new(),
            slow_queries_total: Counter::new(),
            latency_us_total: Counter::new(),
            latency_us_max: Counter::new(),
        }
    }

    #[inline]
    pub fn record_latency(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_us_total.add(us);
        self.latency_us_max.fetch_max(us);
    }

    #[must_use]
    pub fn snapshot(&self) -> SearcherMetricsSnapshot {
        SearcherMetricsSnapshot {
            executions_total: self.executions_total.load(),
            iterations_total: self.iterations_total.load(),
            errors_total: self.errors_total.load(),
            documents_loaded_total: self.documents_loaded_total.load(),
            matches_delivered_total: self.matches_delivered_total.load(),
            slow_queries_total: self.slow_queries_total.load(),
            latency_us_total: self.latency_us_total.load(),
            latency_us_max: self.latency_us_max.load(),
        }
    }
}
