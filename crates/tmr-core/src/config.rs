//! Engine configuration

use crate::error::{TmrError, TmrResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tmr_primitives::LANE_COUNT;
use tmr_scheduler::SchedulerConfig;

/// How replica outputs are judged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// Any disagreeing pair is a fault
    #[default]
    Unanimous,
    /// Two agreeing lanes win; the third is reported as a suspect
    Majority,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduling parameters
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Core each lane worker is pinned to, indexed by lane
    #[serde(default = "default_lane_cores")]
    pub lane_cores: [usize; LANE_COUNT],
    /// Whether to pin workers at all
    #[serde(default = "default_true")]
    pub pin_workers: bool,
    /// Voting policy
    #[serde(default)]
    pub vote_policy: VotePolicy,
    /// Flush hot-region buffers from the cache after each stage
    #[serde(default = "default_true")]
    pub evict_hot_regions: bool,
}

fn default_lane_cores() -> [usize; LANE_COUNT] {
    [1, 2, 3]
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            lane_cores: default_lane_cores(),
            pin_workers: true,
            vote_policy: VotePolicy::default(),
            evict_hot_regions: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> TmrResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| TmrError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> TmrResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TmrError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Check every value
    pub fn validate(&self) -> TmrResult<()> {
        self.scheduler.validate()?;
        let [a, b, c] = self.lane_cores;
        if self.pin_workers && (a == b || b == c || a == c) {
            return Err(TmrError::InvalidConfig(format!(
                "lane cores must be distinct, got {:?}",
                self.lane_cores
            )));
        }
        Ok(())
    }
}
