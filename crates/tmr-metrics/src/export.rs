//! Metrics snapshot and JSON export

use crate::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time copy of every metric, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Counter values
    pub counters: BTreeMap<String, u64>,
    /// Gauge values
    pub gauges: BTreeMap<String, i64>,
    /// Histogram summaries
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Summary of a histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Mean value
    pub mean: f64,
    /// Observation count
    pub count: u64,
    /// Median bucket bound
    pub p50: f64,
    /// 99th percentile bucket bound (`None` when above every bucket)
    pub p99: Option<f64>,
}

impl MetricsSnapshot {
    /// Capture a metrics store
    pub fn from_metrics(metrics: &Metrics) -> Self {
        let histograms = metrics
            .all_histograms()
            .into_iter()
            .map(|(name, h)| {
                let p99 = h.quantile(0.99);
                let summary = HistogramSummary {
                    mean: h.mean(),
                    count: h.total_count(),
                    p50: h.quantile(0.5),
                    p99: p99.is_finite().then_some(p99),
                };
                (name, summary)
            })
            .collect();

        Self {
            counters: metrics.all_counters().into_iter().collect(),
            gauges: metrics.all_gauges().into_iter().collect(),
            histograms,
        }
    }

    /// Counter value, 0 when never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export as compact JSON
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Log the snapshot at debug level
    pub fn log(&self) {
        for (name, value) in &self.counters {
            tracing::debug!(metric = %name, value, "counter");
        }
        for (name, h) in &self.histograms {
            tracing::debug!(metric = %name, mean = h.mean, count = h.count, "histogram");
        }
    }
}
