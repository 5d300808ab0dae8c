//! # tmr-e2e
//!
//! End-to-end testing framework for the TMR engine.
//!
//! ## Design Philosophy
//!
//! 1. **Declarative**: tests describe the dataset, not the arena plumbing
//! 2. **Isolated**: each test gets a fresh arena and engine
//! 3. **Deterministic**: reference processors are pure functions of their inputs
//!
//! ## Usage
//!
//! ```ignore
//! cargo test -p tmr-e2e
//! ```

mod builder;
mod harness;
mod scenarios;
pub mod workloads;

pub use builder::DatasetBuilder;
pub use harness::{init_tracing, TestHarness};

use tmr_core::TmrError;
use tmr_primitives::ArenaError;

/// Test result
pub type E2EResult<T> = Result<T, E2EError>;

/// E2E test errors
#[derive(Debug, thiserror::Error)]
pub enum E2EError {
    /// Setup failed
    #[error("setup failed: {0}")]
    Setup(String),

    /// Engine returned an error
    #[error("engine error: {0}")]
    Engine(#[from] TmrError),

    /// Arena access failed
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),

    /// Assertion failed
    #[error("assertion failed: {0}")]
    Assertion(String),
}
