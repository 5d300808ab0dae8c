//! Engine error types

use thiserror::Error;
use tmr_primitives::{ArenaError, ItemId, LanePair, ReplicaId};
use tmr_scheduler::SchedulerError;

/// Errors returned by [`TmrEngine`](crate::TmrEngine)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TmrError {
    /// Planning failed (configuration, allocation or span validation)
    #[error("scheduling failed: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Arena access failed
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),

    /// Replica outputs disagreed; the run was aborted
    #[error("replica mismatch on {item}: {}", format_pairs(.pairs))]
    ReplicaMismatch {
        /// Logical item whose replicas disagreed
        item: ItemId,
        /// Every disagreeing lane pair, in (0,1), (1,2), (0,2) order
        pairs: Vec<LanePair>,
    },

    /// The processor panicked while running a replica
    #[error("processor panicked on {replica}: {message}")]
    ProcessorPanicked {
        /// Replica being processed
        replica: ReplicaId,
        /// Panic payload, if it was a string
        message: String,
    },

    /// A lane worker went away before the run finished
    #[error("lane worker disconnected")]
    WorkerDisconnected,

    /// A lane worker thread could not be started
    #[error("failed to spawn lane worker: {0}")]
    WorkerSpawn(String),

    /// Engine configuration value out of range
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

fn format_pairs(pairs: &[LanePair]) -> String {
    pairs
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl TmrError {
    /// Check whether this is a detected fault rather than a setup or runtime failure
    pub fn is_fault(&self) -> bool {
        matches!(self, TmrError::ReplicaMismatch { .. })
    }
}

/// Result type for engine operations
pub type TmrResult<T> = Result<T, TmrError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tmr_primitives::Lane;

    #[test]
    fn test_mismatch_display_lists_pairs() {
        let err = TmrError::ReplicaMismatch {
            item: ItemId(4),
            pairs: vec![LanePair::ALL[1], LanePair::ALL[2]],
        };
        assert_eq!(
            err.to_string(),
            "replica mismatch on item#4: lane1<->lane2, lane0<->lane2"
        );
        assert!(err.is_fault());
    }

    #[test]
    fn test_panic_display() {
        let err = TmrError::ProcessorPanicked {
            replica: ReplicaId::new(ItemId(1), Lane::Lane2),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "processor panicked on item#1@lane2: boom");
        assert!(!err.is_fault());
    }

    #[test]
    fn test_from_scheduler_error() {
        let err: TmrError = SchedulerError::TooManyComputeSets { max: 3 }.into();
        assert!(matches!(err, TmrError::Scheduler(_)));
    }
}
