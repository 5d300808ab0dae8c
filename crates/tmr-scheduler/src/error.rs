//! Error types for the scheduler

use thiserror::Error;
use tmr_primitives::{ArenaError, ItemId};

/// Scheduler errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// The conflict graph needs more compute sets than can be expressed
    #[error("conflict graph needs more than {max} compute sets")]
    TooManyComputeSets {
        /// Configured maximum
        max: usize,
    },

    /// Configuration value out of range
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// Partitioner referenced an item outside the dataset
    #[error("unknown work item {0}")]
    UnknownItem(ItemId),

    /// Arena allocation or span validation failed
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::TooManyComputeSets { max: 65535 };
        assert!(err.to_string().contains("65535"));

        let err = SchedulerError::UnknownItem(ItemId::new(7));
        assert!(err.to_string().contains("item#7"));

        let err = SchedulerError::from(ArenaError::AllocationFailed { bytes: 12 });
        assert!(err.to_string().contains("12 bytes"));
    }
}
