//! Error types for the region arena

use thiserror::Error;

/// Region arena errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Backing memory could not be reserved
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed {
        /// Requested size
        bytes: usize,
    },

    /// Span was handed out by a different arena
    #[error("span belongs to arena {found}, not arena {expected}")]
    ForeignSpan {
        /// Arena that was asked
        expected: u32,
        /// Arena recorded in the span
        found: u32,
    },

    /// Span does not lie inside a live block
    #[error("span [{addr:#x}, +{len}) is out of bounds")]
    OutOfBounds {
        /// Start address
        addr: usize,
        /// Length in bytes
        len: usize,
    },

    /// Data length does not match span length
    #[error("length mismatch: span is {expected} bytes, data is {got} bytes")]
    LengthMismatch {
        /// Span length
        expected: usize,
        /// Provided length
        got: usize,
    },

    /// Only whole blocks can be released
    #[error("span [{addr:#x}, +{len}) is not a whole block")]
    NotABlock {
        /// Start address
        addr: usize,
        /// Length in bytes
        len: usize,
    },

    /// The logical address space ran out
    #[error("arena address space exhausted")]
    AddressSpaceExhausted,
}

/// Result type for arena operations
pub type ArenaResult<T> = Result<T, ArenaError>;
