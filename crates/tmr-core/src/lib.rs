//! # tmr-core
//!
//! Triple-modular-redundant execution engine.
//!
//! A [`TmrEngine`] takes a dataset of [`WorkItem`](tmr_scheduler::WorkItem)s
//! living in a [`RegionArena`](tmr_primitives::RegionArena), plans it into
//! conflict-free compute sets and runs every item three times, once per
//! lane. Each lane is a worker thread pinned to its own core. After every
//! stage the three outputs of each item are compared and only an accepted
//! result is written back to the arena.
//!
//! ## Example
//!
//! ```ignore
//! let engine = TmrEngine::new(EngineConfig::default())?;
//! let report = engine.compute(&mut arena, &dataset, &|ctx: &mut ReplicaContext<'_>| {
//!     let sum: u8 = ctx.inputs().iter().flat_map(|i| i.iter()).fold(0, |a, b| a.wrapping_add(*b));
//!     ctx.output().fill(sum);
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod affinity;
mod config;
mod context;
mod engine;
mod error;
mod evict;
mod orchestrator;
mod report;
mod voter;
mod worker;

pub use affinity::pin_current_thread;
pub use config::{EngineConfig, VotePolicy};
pub use context::{Partitioner, Processor, ReplicaContext};
pub use engine::TmrEngine;
pub use error::{TmrError, TmrResult};
pub use evict::flush;
pub use report::{ComputeReport, StageReport, Suspect};
pub use voter::{vote, Verdict};

pub use tmr_primitives::{ItemId, Lane, LanePair, MemorySpan, RegionArena, ReplicaId};
pub use tmr_scheduler::{ConflictGraph, SchedulerConfig, WorkItem};
