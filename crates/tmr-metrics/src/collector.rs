//! Shared metrics store

use crate::{Histogram, MetricsSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe metrics storage
///
/// Metrics are created on first use. Lookups take a read lock; only the
/// first observation of a new name takes the write lock.
#[derive(Default)]
pub struct Metrics {
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<HashMap<String, Arc<AtomicI64>>>,
}

impl Metrics {
    /// Create a new metrics store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a histogram observation
    pub fn histogram(&self, name: &str, value: f64) {
        get_or_insert(&self.histograms, name, Histogram::new).observe(value);
    }

    /// Increment a counter
    pub fn counter(&self, name: &str, delta: u64) {
        get_or_insert(&self.counters, name, || AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Set a gauge value
    pub fn gauge(&self, name: &str, value: i64) {
        get_or_insert(&self.gauges, name, || AtomicI64::new(0)).store(value, Ordering::Relaxed);
    }

    /// Counter value
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Gauge value
    pub fn gauge_value(&self, name: &str) -> Option<i64> {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
    }

    /// Mean of a histogram
    pub fn histogram_mean(&self, name: &str) -> Option<f64> {
        self.histograms.read().get(name).map(|h| h.mean())
    }

    /// Number of observations in a histogram
    pub fn histogram_count(&self, name: &str) -> Option<u64> {
        self.histograms.read().get(name).map(|h| h.total_count())
    }

    /// Bucket upper bound below which `q` of the observations fall
    pub fn histogram_quantile(&self, name: &str, q: f64) -> Option<f64> {
        self.histograms.read().get(name).map(|h| h.quantile(q))
    }

    /// Capture every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::from_metrics(self)
    }

    pub(crate) fn all_counters(&self) -> Vec<(String, u64)> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    pub(crate) fn all_gauges(&self) -> Vec<(String, i64)> {
        self.gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    pub(crate) fn all_histograms(&self) -> Vec<(String, Arc<Histogram>)> {
        self.histograms
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }
}

fn get_or_insert<T>(
    map: &RwLock<HashMap<String, Arc<T>>>,
    name: &str,
    make: impl FnOnce() -> T,
) -> Arc<T> {
    if let Some(existing) = map.read().get(name) {
        return Arc::clone(existing);
    }
    let mut map = map.write();
    Arc::clone(map.entry(name.to_string()).or_insert_with(|| Arc::new(make())))
}
