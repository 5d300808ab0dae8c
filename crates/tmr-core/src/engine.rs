//! Engine entry points

use crate::config::EngineConfig;
use crate::context::{Partitioner, Processor};
use crate::error::TmrResult;
use crate::orchestrator::{orchestrate, RunOutcome};
use crate::report::ComputeReport;
use std::sync::Arc;
use tmr_metrics::{names, timed, Metrics};
use tmr_primitives::RegionArena;
use tmr_scheduler::{SchedulePlan, Scheduler, WorkItem};
use tracing::{error, info};

/// Triple-modular-redundant compute engine
///
/// Every `compute` call plans the dataset, runs each compute set on three
/// lane workers and votes on the outputs before committing them to the
/// arena. Nothing survives between calls except metrics.
pub struct TmrEngine {
    config: EngineConfig,
    scheduler: Scheduler,
    metrics: Arc<Metrics>,
}

impl TmrEngine {
    /// Create an engine, validating the config
    pub fn new(config: EngineConfig) -> TmrResult<Self> {
        config.validate()?;
        let scheduler = Scheduler::new(config.scheduler.clone())?;
        Ok(Self {
            config,
            scheduler,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared metrics store
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Run `processor` on every item of `dataset`
    ///
    /// Conflicts are found by sweeping the declared spans. On success every
    /// item's output span holds the accepted result. On a fault the run is
    /// aborted: outputs of earlier stages stay committed, later ones are
    /// never written.
    pub fn compute<P>(
        &self,
        arena: &mut RegionArena,
        dataset: &[WorkItem],
        processor: &P,
    ) -> TmrResult<ComputeReport>
    where
        P: Processor + ?Sized,
    {
        let plan = timed!(self.metrics, names::PLAN_US, {
            self.scheduler.plan(arena, dataset)
        })?;
        self.execute(arena, plan, processor)
    }

    /// Run `processor` using a caller-supplied conflict graph
    ///
    /// The partitioner replaces span analysis: no conflict sweep and no
    /// hot-region duplication, so every lane reads the original inputs.
    pub fn compute_with_partitioner<Q, P>(
        &self,
        arena: &mut RegionArena,
        dataset: &[WorkItem],
        partitioner: &Q,
        processor: &P,
    ) -> TmrResult<ComputeReport>
    where
        Q: Partitioner + ?Sized,
        P: Processor + ?Sized,
    {
        let graph = partitioner.partition(dataset);
        let plan = timed!(self.metrics, names::PLAN_US, {
            self.scheduler.plan_with_graph(arena, dataset, &graph)
        })?;
        self.execute(arena, plan, processor)
    }

    fn execute<P>(
        &self,
        arena: &mut RegionArena,
        mut plan: SchedulePlan,
        processor: &P,
    ) -> TmrResult<ComputeReport>
    where
        P: Processor + ?Sized,
    {
        self.metrics.gauge(names::COMPUTE_SETS, plan.stage_count() as i64);
        self.metrics.gauge(names::HOT_REGIONS, plan.hot_regions.len() as i64);
        self.metrics.gauge(names::CONFLICT_EDGES, plan.conflict_edges as i64);

        let mut report = ComputeReport {
            items: plan.items,
            replicas: plan.replicas.len(),
            compute_sets: plan.stage_count(),
            conflict_edges: plan.conflict_edges,
            hot_regions: plan.hot_regions.len(),
            ..ComputeReport::default()
        };

        let outcome = if plan.stages.is_empty() {
            Ok(RunOutcome::default())
        } else {
            orchestrate(arena, &mut plan, processor, &self.config, &self.metrics)
        };

        let released = plan.release(arena);
        let outcome = match (outcome, released) {
            (Ok(outcome), Ok(())) => outcome,
            (Ok(_), Err(e)) => return Err(e.into()),
            (Err(e), released) => {
                if let Err(release_error) = released {
                    error!(%release_error, "failed to release hot-region copies after abort");
                }
                error!(error = %e, items = plan.items, "compute aborted");
                return Err(e);
            }
        };

        report.stages = outcome.stages;
        report.suspects = outcome.suspects;
        report.unpinned_lanes = outcome.unpinned_lanes;
        self.metrics.counter(names::RUNS, 1);

        info!(
            items = report.items,
            stages = report.stages.len(),
            hot_regions = report.hot_regions,
            suspects = report.suspects.len(),
            "compute finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReplicaContext;
    use crate::error::TmrError;
    use tmr_primitives::ItemId;
    use tmr_scheduler::{ConflictGraph, SchedulerError};

    fn engine() -> TmrEngine {
        TmrEngine::new(EngineConfig {
            pin_workers: false,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn xor_inputs(ctx: &mut ReplicaContext<'_>) {
        let mut acc = vec![0u8; ctx.output().len()];
        for input in ctx.inputs() {
            for (a, b) in acc.iter_mut().zip(input.iter()) {
                *a ^= b;
            }
        }
        ctx.output().copy_from_slice(&acc);
    }

    #[test]
    fn test_empty_dataset() {
        let mut arena = RegionArena::new();
        let report = engine().compute(&mut arena, &[], &xor_inputs).unwrap();

        assert_eq!(report.items, 0);
        assert!(report.stages.is_empty());
    }

    #[test]
    fn test_compute_commits_outputs() {
        let mut arena = RegionArena::new();
        let a = arena.alloc_from(&[0b1010; 4]).unwrap();
        let b = arena.alloc_from(&[0b0110; 4]).unwrap();
        let out = arena.alloc(4).unwrap();
        let engine = engine();

        let report = engine
            .compute(&mut arena, &[WorkItem::new(vec![a, b], out)], &xor_inputs)
            .unwrap();

        assert_eq!(arena.read(&out).unwrap(), &[0b1100u8; 4][..]);
        assert_eq!(report.replicas, 3);
        assert_eq!(report.compute_sets, 1);
        assert!(report.is_clean());
        assert_eq!(engine.metrics().counter_value(names::RUNS), Some(1));
    }

    #[test]
    fn test_hot_copies_released() {
        let mut arena = RegionArena::new();
        let shared = arena.alloc_from(&[3u8; 32]).unwrap();
        let items: Vec<WorkItem> = (0..4)
            .map(|_| WorkItem::single(shared, arena.alloc(32).unwrap()))
            .collect();
        let blocks = arena.block_count();

        let report = engine().compute(&mut arena, &items, &xor_inputs).unwrap();

        assert_eq!(report.hot_regions, 1);
        assert_eq!(arena.block_count(), blocks);
    }

    #[test]
    fn test_partitioner_serialises_items() {
        let mut arena = RegionArena::new();
        let items: Vec<WorkItem> = (0..3)
            .map(|_| WorkItem::new(vec![], arena.alloc(1).unwrap()))
            .collect();
        let chain = |dataset: &[WorkItem]| {
            let mut graph = ConflictGraph::new();
            for i in 1..dataset.len() {
                graph.add_conflict(ItemId::from(i - 1), ItemId::from(i));
            }
            graph
        };

        let report = engine()
            .compute_with_partitioner(&mut arena, &items, &chain, &xor_inputs)
            .unwrap();

        assert_eq!(report.compute_sets, 2);
        assert_eq!(report.conflict_edges, 18);
    }

    #[test]
    fn test_panic_surfaces_as_error() {
        let mut arena = RegionArena::new();
        let items = vec![WorkItem::new(vec![], arena.alloc(1).unwrap())];
        let blocks = arena.block_count();

        let err = engine()
            .compute(&mut arena, &items, &|ctx: &mut ReplicaContext<'_>| {
                if ctx.lane() == tmr_primitives::Lane::Lane2 {
                    panic!("lane 2 exploded");
                }
            })
            .unwrap_err();

        assert!(matches!(err, TmrError::ProcessorPanicked { .. }));
        assert_eq!(arena.block_count(), blocks);
    }

    #[test]
    fn test_scheduler_error_propagates() {
        let mut arena = RegionArena::new();
        let out = arena.alloc(4).unwrap();
        let items: Vec<WorkItem> = (0..3).map(|_| WorkItem::new(vec![], out)).collect();
        let mut config = EngineConfig {
            pin_workers: false,
            ..EngineConfig::default()
        };
        config.scheduler.max_compute_sets = 2;

        let err = TmrEngine::new(config)
            .unwrap()
            .compute(&mut arena, &items, &xor_inputs)
            .unwrap_err();

        assert_eq!(
            err,
            TmrError::Scheduler(SchedulerError::TooManyComputeSets { max: 2 })
        );
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EngineConfig::default();
        config.scheduler.hot_region_threshold = -1.0;
        assert!(TmrEngine::new(config).is_err());
    }
}
