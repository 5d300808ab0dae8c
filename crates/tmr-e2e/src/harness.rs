//! Test harness for E2E testing
//!
//! Owns an arena and an engine so scenarios only describe data and processors.

use crate::{E2EError, E2EResult};
use rand::RngCore;
use std::sync::Once;
use tmr_core::{
    ComputeReport, EngineConfig, Partitioner, Processor, TmrEngine, VotePolicy, WorkItem,
};
use tmr_primitives::{MemorySpan, RegionArena};
use tracing::debug;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once per process
///
/// Honors `RUST_LOG`; silent by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Test harness for end-to-end engine runs
pub struct TestHarness {
    /// Arena holding every input and output of the test
    arena: RegionArena,
    /// Engine under test
    engine: TmrEngine,
}

impl TestHarness {
    /// Create a harness with the default (unanimous) policy
    ///
    /// Workers are left unpinned so tests pass on machines with fewer than
    /// four cores.
    pub fn new() -> Self {
        Self::with_policy(VotePolicy::Unanimous)
    }

    /// Create a harness with a specific vote policy
    pub fn with_policy(vote_policy: VotePolicy) -> Self {
        Self::with_config(EngineConfig {
            pin_workers: false,
            vote_policy,
            ..EngineConfig::default()
        })
        .unwrap_or_else(|e| panic!("default engine config rejected: {e}"))
    }

    /// Create a harness from an explicit config
    ///
    /// A config the engine rejects is reported as [`E2EError::Setup`].
    pub fn with_config(config: EngineConfig) -> E2EResult<Self> {
        init_tracing();
        let engine = TmrEngine::new(config).map_err(|e| E2EError::Setup(e.to_string()))?;
        Ok(Self {
            arena: RegionArena::new(),
            engine,
        })
    }

    /// Get the arena
    pub fn arena(&self) -> &RegionArena {
        &self.arena
    }

    /// Get the arena mutably
    pub fn arena_mut(&mut self) -> &mut RegionArena {
        &mut self.arena
    }

    /// Get the engine
    pub fn engine(&self) -> &TmrEngine {
        &self.engine
    }

    /// Allocate a block holding `data`
    pub fn input(&mut self, data: &[u8]) -> MemorySpan {
        self.arena
            .alloc_from(data)
            .unwrap_or_else(|e| panic!("input allocation failed: {e}"))
    }

    /// Allocate a block of `len` random bytes
    pub fn random_input(&mut self, len: usize) -> MemorySpan {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        self.input(&data)
    }

    /// Allocate a zeroed output block
    pub fn output(&mut self, len: usize) -> MemorySpan {
        self.arena
            .alloc(len)
            .unwrap_or_else(|e| panic!("output allocation failed: {e}"))
    }

    /// Run a dataset
    pub fn run<P>(&mut self, dataset: &[WorkItem], processor: &P) -> E2EResult<ComputeReport>
    where
        P: Processor + ?Sized,
    {
        let report = self.engine.compute(&mut self.arena, dataset, processor)?;
        debug!(items = dataset.len(), stages = report.stages.len(), "harness run complete");
        Ok(report)
    }

    /// Run a dataset with a caller-supplied conflict graph
    pub fn run_partitioned<Q, P>(
        &mut self,
        dataset: &[WorkItem],
        partitioner: &Q,
        processor: &P,
    ) -> E2EResult<ComputeReport>
    where
        Q: Partitioner + ?Sized,
        P: Processor + ?Sized,
    {
        Ok(self
            .engine
            .compute_with_partitioner(&mut self.arena, dataset, partitioner, processor)?)
    }

    /// Copy the bytes behind a span
    pub fn read(&self, span: &MemorySpan) -> Vec<u8> {
        self.arena
            .read(span)
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|e| panic!("read of {span:?} failed: {e}"))
    }

    /// Fail unless a span holds exactly `expected`
    pub fn expect_bytes(&self, span: &MemorySpan, expected: &[u8]) -> E2EResult<()> {
        let actual = self.arena.read(span)?;
        if actual != expected {
            return Err(E2EError::Assertion(format!(
                "{span:?}: expected {}, got {}",
                hex::encode(expected),
                hex::encode(actual)
            )));
        }
        Ok(())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
