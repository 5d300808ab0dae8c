//! Latency histogram

use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram over fixed bucket boundaries
///
/// The last bucket is unbounded.
pub struct Histogram {
    /// Upper bucket boundaries, ascending (microseconds)
    bounds: Vec<f64>,
    /// One count per boundary plus the overflow bucket
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Histogram with buckets suited to stage latencies
    pub fn new() -> Self {
        Self::with_buckets(vec![
            10.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 5_000.0, 25_000.0, 100_000.0,
        ])
    }

    /// Histogram with custom upper bounds
    pub fn with_buckets(mut bounds: Vec<f64>) -> Self {
        bounds.sort_by(|a, b| a.total_cmp(b));
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: f64) {
        self.sum.fetch_add(value.max(0.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        let bucket = self.bounds.partition_point(|b| *b < value);
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Mean of all observations
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Total number of observations
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Upper bound of the bucket holding the `q` quantile
    ///
    /// Returns infinity when it falls in the overflow bucket and 0 when
    /// nothing was observed.
    pub fn quantile(&self, q: f64) -> f64 {
        let total = self.total_count();
        if total == 0 {
            return 0.0;
        }
        let rank = ((q.clamp(0.0, 1.0) * total as f64).ceil() as u64).max(1);
        let mut seen = 0;
        for (i, count) in self.counts.iter().enumerate() {
            seen += count.load(Ordering::Relaxed);
            if seen >= rank {
                return self.bounds.get(i).copied().unwrap_or(f64::INFINITY);
            }
        }
        f64::INFINITY
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
