//! Schedule planning
//!
//! Turns a dataset into replicas grouped into ordered compute stages:
//! validate spans, triplicate, duplicate hot regions, build the conflict
//! graph, then color it. A caller-supplied item graph skips the hot-region
//! and span steps and is lifted to replicas instead.

use crate::coloring::ComputeSets;
use crate::config::SchedulerConfig;
use crate::conflict::{build_conflict_graph, lift_to_replicas, ConflictGraph};
use crate::error::{SchedulerError, SchedulerResult};
use crate::hot_region::HotRegionTable;
use crate::replica::{replicate, Replica};
use crate::work_item::WorkItem;
use tmr_primitives::{ItemId, RegionArena, ReplicaId};
use tracing::debug;

/// A set of replicas that may run concurrently
#[derive(Clone, Debug)]
pub struct ComputeStage {
    /// Stage index (0 = first stage)
    pub index: usize,
    /// Replicas in this stage
    pub replicas: Vec<ReplicaId>,
}

impl ComputeStage {
    /// Create a new compute stage
    pub fn new(index: usize, replicas: Vec<ReplicaId>) -> Self {
        Self { index, replicas }
    }

    /// Get number of replicas in the stage
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Check if the stage is empty
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Everything the orchestrator needs to run a dataset
///
/// The plan owns hot-region copies inside the arena. Call
/// [`SchedulePlan::release`] once the run is over.
#[derive(Debug)]
pub struct SchedulePlan {
    /// Replicas indexed by [`replica_index`](crate::replica::replica_index)
    pub replicas: Vec<Replica>,
    /// Stages in execution order
    pub stages: Vec<ComputeStage>,
    /// Hot regions duplicated for this run
    pub hot_regions: HotRegionTable,
    /// Number of edges in the replica conflict graph
    pub conflict_edges: usize,
    /// Number of logical items
    pub items: usize,
}

impl SchedulePlan {
    /// Number of compute stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Largest stage size
    pub fn max_parallelism(&self) -> usize {
        self.stages.iter().map(ComputeStage::len).max().unwrap_or(0)
    }

    /// Replicas per stage on average (1.0 means fully serial)
    pub fn parallelism_ratio(&self) -> f64 {
        if self.stages.is_empty() {
            return 0.0;
        }
        self.replicas.len() as f64 / self.stages.len() as f64
    }

    /// Free hot-region copies
    pub fn release(&mut self, arena: &mut RegionArena) -> SchedulerResult<()> {
        self.hot_regions.release(arena)
    }
}

/// Compute-set scheduler
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler, validating the config
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Plan a dataset using the sweep-line conflict graph
    pub fn plan(
        &self,
        arena: &mut RegionArena,
        dataset: &[WorkItem],
    ) -> SchedulerResult<SchedulePlan> {
        self.plan_inner(arena, dataset, true, |replicas, hot| {
            Ok(build_conflict_graph(replicas, hot))
        })
    }

    /// Plan a dataset using a conflict graph over logical items
    ///
    /// Items absent from `graph` are treated as conflict-free. An edge
    /// naming an item outside the dataset is an error. The caller's graph
    /// replaces span analysis entirely, so no hot regions are duplicated and
    /// every lane reads the original inputs.
    pub fn plan_with_graph(
        &self,
        arena: &mut RegionArena,
        dataset: &[WorkItem],
        graph: &ConflictGraph<ItemId>,
    ) -> SchedulerResult<SchedulePlan> {
        if let Some(&unknown) = graph.nodes().iter().find(|id| id.index() >= dataset.len()) {
            return Err(SchedulerError::UnknownItem(unknown));
        }
        self.plan_inner(arena, dataset, false, |replicas, _| {
            Ok(lift_to_replicas(graph, replicas))
        })
    }

    fn plan_inner<F>(
        &self,
        arena: &mut RegionArena,
        dataset: &[WorkItem],
        duplicate_hot: bool,
        conflicts: F,
    ) -> SchedulerResult<SchedulePlan>
    where
        F: FnOnce(&[Replica], &HotRegionTable) -> SchedulerResult<ConflictGraph<ReplicaId>>,
    {
        for item in dataset {
            for span in item.spans() {
                arena.read(span)?;
            }
        }
        if dataset.len() > u32::MAX as usize {
            return Err(SchedulerError::InvalidConfig(format!(
                "dataset of {} items exceeds the item id range",
                dataset.len()
            )));
        }

        let mut replicas = replicate(dataset)?;
        let mut hot_regions = HotRegionTable::new();

        let duplicated = if duplicate_hot {
            hot_regions.duplicate(arena, &mut replicas, &self.config)
        } else {
            Ok(0)
        };
        let staged = duplicated
            .and_then(|_| conflicts(&replicas, &hot_regions))
            .and_then(|graph| {
                let sets = ComputeSets::color(&graph, self.config.max_compute_sets)?;
                Ok((graph.edge_count(), sets))
            });

        let (conflict_edges, sets) = match staged {
            Ok(v) => v,
            Err(e) => {
                hot_regions.release(arena)?;
                return Err(e);
            }
        };

        let stages: Vec<ComputeStage> = sets
            .into_stages()
            .into_iter()
            .enumerate()
            .map(|(index, replicas)| ComputeStage::new(index, replicas))
            .collect();

        debug!(
            items = dataset.len(),
            stages = stages.len(),
            conflict_edges,
            hot_regions = hot_regions.len(),
            "schedule planned"
        );

        Ok(SchedulePlan {
            replicas,
            stages,
            hot_regions,
            conflict_edges,
            items: dataset.len(),
        })
    }
}
