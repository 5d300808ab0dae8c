//! # tmr-scheduler
//!
//! Compute-set scheduling for triple-modular-redundant execution.
//!
//! This crate turns a dataset of work items into an ordered list of
//! conflict-free compute stages:
//! - Replication of every item across the three lanes
//! - Hot-region duplication for widely shared inputs
//! - Sweep-line conflict detection over declared memory spans
//! - Greedy graph coloring into compute sets

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coloring;
pub mod config;
pub mod conflict;
pub mod error;
pub mod hot_region;
pub mod replica;
pub mod scheduler;
pub mod work_item;

pub use coloring::ComputeSets;
pub use config::{SchedulerConfig, DEFAULT_HOT_REGION_THRESHOLD, MAX_COMPUTE_SETS};
pub use conflict::{build_conflict_graph, lift_to_replicas, ConflictGraph};
pub use error::{SchedulerError, SchedulerResult};
pub use hot_region::{HotRegion, HotRegionTable};
pub use replica::{replica_index, replicate, Replica};
pub use scheduler::{ComputeStage, SchedulePlan, Scheduler};
pub use work_item::WorkItem;
