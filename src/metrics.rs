use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub enum MetricUnit {
    Count,
    Milliseconds,
    Bytes,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Count => "count",
            MetricUnit::Milliseconds => "ms",
            MetricUnit::Bytes => "bytes",
        }
    }
}

/// Sink for named, timestamped measurements. The dashboard wires its own
/// implementation in; [`LogMetricsSink`] is the default.
pub trait MetricsSink: Send + Sync {
    fn record_metric(&self, name: &str, value: f64, unit: MetricUnit, attrs: &[(&str, &str)]);
}

/// Writes every measurement to the debug log.
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn record_metric(&self, name: &str, value: f64, unit: MetricUnit, attrs: &[(&str, &str)]) {
        if attrs.is_empty() {
            log::debug!("metric {name}={value}{}", unit.as_str());
        } else {
            log::debug!("metric {name}={value}{} {attrs:?}", unit.as_str());
        }
    }
}

/// Internal counters behind `get_stats().performance`.
#[derive(Default)]
pub(crate) struct PerformanceTracker {
    fetches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_calls: AtomicU64,
    retries: AtomicU64,
    dedup_joins: AtomicU64,
    network_time_ms: AtomicU64,
}

impl PerformanceTracker {
    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_call(&self) {
        self.network_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup_join(&self) {
        self.dedup_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_time(&self, elapsed: Duration) {
        self.network_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PerformanceStats {
        let network_calls = self.network_calls.load(Ordering::Relaxed);
        let network_time_ms = self.network_time_ms.load(Ordering::Relaxed);
        let avg_network_ms = if network_calls > 0 {
            network_time_ms as f64 / network_calls as f64
        } else {
            0.0
        };

        PerformanceStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_calls,
            retries: self.retries.load(Ordering::Relaxed),
            dedup_joins: self.dedup_joins.load(Ordering::Relaxed),
            avg_network_ms,
        }
    }
}

/// Point-in-time view of the client's internal counters.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub fetches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_calls: u64,
    pub retries: u64,
    pub dedup_joins: u64,
    pub avg_network_ms: f64,
}
