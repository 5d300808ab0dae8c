//! Run reports

use serde::{Deserialize, Serialize};
use tmr_primitives::{ItemId, Lane};

/// Summary of a successful `compute` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeReport {
    /// Logical items in the dataset
    pub items: usize,
    /// Replicas executed (three per item)
    pub replicas: usize,
    /// Executed stages in order
    pub stages: Vec<StageReport>,
    /// Compute sets (colors) in the schedule
    pub compute_sets: usize,
    /// Edges in the replica conflict graph
    pub conflict_edges: usize,
    /// Input spans duplicated per lane
    pub hot_regions: usize,
    /// Lanes outvoted under the majority policy
    pub suspects: Vec<Suspect>,
    /// Lanes whose worker could not be pinned
    pub unpinned_lanes: Vec<Lane>,
}

impl ComputeReport {
    /// Check whether every lane agreed on every item
    pub fn is_clean(&self) -> bool {
        self.suspects.is_empty()
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One executed stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage (color) index
    pub index: usize,
    /// Replicas run in the stage
    pub replicas: usize,
    /// Wall time including barrier, eviction and voting
    pub elapsed_us: u64,
}

/// A lane outvoted by the other two
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspect {
    /// Item whose output differed
    pub item: ItemId,
    /// Minority lane
    pub lane: Lane,
    /// First differing byte
    pub first_difference: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json() {
        let report = ComputeReport {
            items: 2,
            replicas: 6,
            stages: vec![StageReport {
                index: 0,
                replicas: 6,
                elapsed_us: 12,
            }],
            compute_sets: 1,
            suspects: vec![Suspect {
                item: ItemId(1),
                lane: Lane::Lane2,
                first_difference: 3,
            }],
            ..ComputeReport::default()
        };

        let json = report.to_json().unwrap();
        let parsed: ComputeReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, report);
        assert!(!parsed.is_clean());
    }
}
