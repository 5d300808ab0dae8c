//! # tmr-metrics
//!
//! Metrics for TMR compute runs.
//!
//! Features:
//! - Latency histograms with bucket quantiles
//! - Counters for replicas, mismatches and suspects
//! - Gauges for the shape of the last schedule
//! - JSON snapshot export

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod export;
mod histogram;
pub mod names;

pub use collector::Metrics;
pub use export::{HistogramSummary, MetricsSnapshot};
pub use histogram::Histogram;

/// Time a block and record the elapsed microseconds into a histogram
#[macro_export]
macro_rules! timed {
    ($metrics:expr, $name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        $metrics.histogram($name, start.elapsed().as_micros() as f64);
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_records_histogram() {
        let metrics = Metrics::new();
        let value = timed!(metrics, names::PLAN_US, { 6 * 7 });

        assert_eq!(value, 42);
        assert_eq!(metrics.histogram_count(names::PLAN_US), Some(1));
    }
}
