//! Scheduler configuration

use crate::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};

/// Upper bound on compute sets (colors) per run
pub const MAX_COMPUTE_SETS: usize = 65535;

/// Fraction of the dataset that must share a span for it to be duplicated
pub const DEFAULT_HOT_REGION_THRESHOLD: f64 = 0.05;

/// Scheduling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// A span read by more than `threshold × items` items is duplicated per lane
    #[serde(default = "default_hot_region_threshold")]
    pub hot_region_threshold: f64,
    /// Minimum number of distinct items sharing a span before it can be hot
    #[serde(default = "default_min_hot_references")]
    pub min_hot_references: usize,
    /// Maximum number of compute sets a run may use
    #[serde(default = "default_max_compute_sets")]
    pub max_compute_sets: usize,
}

fn default_hot_region_threshold() -> f64 {
    DEFAULT_HOT_REGION_THRESHOLD
}

fn default_min_hot_references() -> usize {
    2
}

fn default_max_compute_sets() -> usize {
    MAX_COMPUTE_SETS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hot_region_threshold: default_hot_region_threshold(),
            min_hot_references: default_min_hot_references(),
            max_compute_sets: default_max_compute_sets(),
        }
    }
}

impl SchedulerConfig {
    /// Config with a custom hot-region threshold
    pub fn with_hot_region_threshold(threshold: f64) -> Self {
        Self {
            hot_region_threshold: threshold,
            ..Self::default()
        }
    }

    /// Check that every value is in range
    pub fn validate(&self) -> SchedulerResult<()> {
        if !self.hot_region_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.hot_region_threshold)
        {
            return Err(SchedulerError::InvalidConfig(format!(
                "hot_region_threshold must be within [0, 1], got {}",
                self.hot_region_threshold
            )));
        }
        if self.min_hot_references == 0 {
            return Err(SchedulerError::InvalidConfig(
                "min_hot_references must be at least 1".to_string(),
            ));
        }
        if self.max_compute_sets == 0 || self.max_compute_sets > MAX_COMPUTE_SETS {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_compute_sets must be within [1, {}], got {}",
                MAX_COMPUTE_SETS, self.max_compute_sets
            )));
        }
        Ok(())
    }
}
