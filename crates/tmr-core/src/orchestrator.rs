//! Stage-by-stage execution of a schedule plan
//!
//! Per stage: dispatch every replica to its lane queue, wait until each one
//! has reported back, flush hot-region buffers, then vote and commit every
//! item whose three lanes are complete. Stage `i + 1` is never dispatched
//! before stage `i` has fully drained.

use crate::config::EngineConfig;
use crate::context::Processor;
use crate::error::{TmrError, TmrResult};
use crate::evict;
use crate::report::{StageReport, Suspect};
use crate::voter::{self, Verdict};
use crate::worker::{run_lane, ArenaLock, Job, LaneEvent, LaneMessage, LaneOutputs, LaneShared};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::thread;
use std::time::Instant;
use tmr_metrics::{names, timed, Metrics};
use tmr_primitives::{ItemId, Lane, MemorySpan, RegionArena, ReplicaId, LANE_COUNT};
use tmr_scheduler::{replica_index, ComputeStage, SchedulePlan};
use tracing::{debug, error, trace, warn};

/// What a successful run produced besides the committed outputs
#[derive(Debug, Default)]
pub(crate) struct RunOutcome {
    pub stages: Vec<StageReport>,
    pub suspects: Vec<Suspect>,
    pub unpinned_lanes: Vec<Lane>,
}

/// Run every stage of `plan` on three lane workers
pub(crate) fn orchestrate<P>(
    arena: &mut RegionArena,
    plan: &mut SchedulePlan,
    processor: &P,
    config: &EngineConfig,
    metrics: &Metrics,
) -> TmrResult<RunOutcome>
where
    P: Processor + ?Sized,
{
    let lock: ArenaLock<'_> = RwLock::new(arena);
    let outputs = LaneOutputs::new();
    let (event_tx, event_rx) = unbounded();

    thread::scope(|scope| {
        let mut queues: Vec<Sender<LaneMessage>> = Vec::with_capacity(LANE_COUNT);
        let mut spawned = Ok(());

        for lane in Lane::ALL {
            let (queue_tx, queue_rx) = unbounded();
            let shared = LaneShared {
                arena: &lock,
                processor,
                outputs: &outputs,
            };
            let events = event_tx.clone();
            let core = config.pin_workers.then(|| config.lane_cores[lane.index()]);

            let handle = thread::Builder::new()
                .name(format!("tmr-lane-{}", lane.index()))
                .spawn_scoped(scope, move || run_lane(lane, core, queue_rx, events, shared));
            if let Err(e) = handle {
                spawned = Err(TmrError::WorkerSpawn(e.to_string()));
                break;
            }
            queues.push(queue_tx);
        }
        drop(event_tx);

        let result = spawned.and_then(|()| {
            let driver = Driver {
                lock: &lock,
                outputs: &outputs,
                queues: &queues,
                events: &event_rx,
                config,
                metrics,
            };
            driver.run(plan)
        });

        for queue in &queues {
            let _ = queue.send(LaneMessage::Shutdown);
        }
        result
    })
}

struct Driver<'s, 'a> {
    lock: &'s ArenaLock<'a>,
    outputs: &'s LaneOutputs,
    queues: &'s [Sender<LaneMessage>],
    events: &'s Receiver<LaneEvent>,
    config: &'s EngineConfig,
    metrics: &'s Metrics,
}

impl Driver<'_, '_> {
    fn run(&self, plan: &mut SchedulePlan) -> TmrResult<RunOutcome> {
        let mut outcome = RunOutcome {
            unpinned_lanes: self.await_workers()?,
            ..RunOutcome::default()
        };
        if !outcome.unpinned_lanes.is_empty() {
            self.metrics
                .counter(names::UNPINNED_LANES, outcome.unpinned_lanes.len() as u64);
        }

        for stage in &plan.stages {
            let start = Instant::now();

            for &id in &stage.replicas {
                let replica = &mut plan.replicas[replica_index(id)];
                let job = Job {
                    replica: id,
                    inputs: replica.inputs.clone(),
                    buffer: replica.take_buffer(),
                };
                self.queues[id.lane.index()]
                    .send(LaneMessage::Run(job))
                    .map_err(|_| TmrError::WorkerDisconnected)?;
            }

            self.barrier(stage)?;

            if self.config.evict_hot_regions && !plan.hot_regions.is_empty() {
                self.evict(stage, plan);
            }

            timed!(self.metrics, names::VOTE_US, {
                self.vote_stage(stage, plan, &mut outcome.suspects)
            })?;

            let elapsed_us = start.elapsed().as_micros() as u64;
            self.metrics.histogram(names::STAGE_US, elapsed_us as f64);
            debug!(stage = stage.index, replicas = stage.len(), elapsed_us, "stage complete");
            outcome.stages.push(StageReport {
                index: stage.index,
                replicas: stage.len(),
                elapsed_us,
            });
        }

        Ok(outcome)
    }

    /// Wait for every worker to start; returns lanes that could not be pinned
    fn await_workers(&self) -> TmrResult<Vec<Lane>> {
        let mut unpinned = Vec::new();
        let mut started = 0;
        while started < LANE_COUNT {
            match self.events.recv() {
                Ok(LaneEvent::Started { lane, pinned }) => {
                    started += 1;
                    if !pinned {
                        unpinned.push(lane);
                    }
                }
                Ok(other) => warn!(?other, "unexpected lane event before dispatch"),
                Err(_) => return Err(TmrError::WorkerDisconnected),
            }
        }
        unpinned.sort();
        Ok(unpinned)
    }

    /// Block until every replica of the stage has reported back
    fn barrier(&self, stage: &ComputeStage) -> TmrResult<()> {
        let mut pending = stage.len();
        let mut failure: Option<TmrError> = None;

        while pending > 0 {
            match self.events.recv() {
                Ok(LaneEvent::Finished { replica }) => {
                    trace!(%replica, "replica finished");
                    self.metrics.counter(names::REPLICAS_EXECUTED, 1);
                }
                Ok(LaneEvent::Panicked { replica, message }) => {
                    error!(%replica, %message, "processor panicked");
                    self.metrics.counter(names::PANICS, 1);
                    failure.get_or_insert(TmrError::ProcessorPanicked { replica, message });
                }
                Ok(LaneEvent::Failed { replica, error }) => {
                    error!(%replica, %error, "replica could not read its inputs");
                    failure.get_or_insert(TmrError::Arena(error));
                }
                Ok(LaneEvent::Started { .. }) => continue,
                Err(_) => return Err(TmrError::WorkerDisconnected),
            }
            pending -= 1;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush hot-region buffers the stage read
    fn evict(&self, stage: &ComputeStage, plan: &SchedulePlan) {
        let spans: BTreeSet<MemorySpan> = stage
            .replicas
            .iter()
            .flat_map(|&id| plan.replicas[replica_index(id)].inputs.iter())
            .filter(|span| plan.hot_regions.is_excluded(span))
            .copied()
            .collect();

        let arena = self.lock.read();
        for span in &spans {
            if let Ok(bytes) = arena.read(span) {
                evict::flush(bytes);
            }
        }
    }

    /// Vote on every item of the stage whose lanes are all complete
    ///
    /// Accepted outputs are committed only once the whole stage has voted, so
    /// a mismatch leaves every output of the stage untouched.
    fn vote_stage(
        &self,
        stage: &ComputeStage,
        plan: &SchedulePlan,
        suspects: &mut Vec<Suspect>,
    ) -> TmrResult<()> {
        let mut seen: HashSet<ItemId> = HashSet::new();
        let mut accepted: Vec<(MemorySpan, Vec<u8>)> = Vec::new();

        for item in stage.replicas.iter().map(|id| id.item) {
            if !seen.insert(item) {
                continue;
            }
            let Some((_, lanes)) = self
                .outputs
                .remove_if(&item, |_, lanes| lanes.iter().all(Option::is_some))
            else {
                continue;
            };
            let [Some(l0), Some(l1), Some(l2)] = lanes else {
                continue;
            };
            let mut buffers = [l0, l1, l2];

            let verdict = voter::vote(
                self.config.vote_policy,
                [&buffers[0], &buffers[1], &buffers[2]],
            );
            let output = plan.replicas[replica_index(ReplicaId::new(item, Lane::Lane0))].output;
            let winner = verdict.winner();

            match verdict {
                Verdict::Mismatch {
                    pairs,
                    first_difference,
                } => {
                    self.metrics.counter(names::MISMATCHES, 1);
                    let disagreeing: Vec<String> = pairs.iter().map(|p| p.to_string()).collect();
                    error!(
                        %item,
                        pairs = %disagreeing.join(","),
                        offset = %format_args!("{:#x}", first_difference),
                        bytes = %window(&buffers, first_difference),
                        "replica outputs disagree"
                    );
                    return Err(TmrError::ReplicaMismatch { item, pairs });
                }
                Verdict::Outvoted {
                    suspect,
                    first_difference,
                } => {
                    self.metrics.counter(names::SUSPECTS, 1);
                    warn!(
                        %item,
                        lane = %suspect,
                        offset = %format_args!("{:#x}", first_difference),
                        bytes = %window(&buffers, first_difference),
                        "lane outvoted"
                    );
                    suspects.push(Suspect {
                        item,
                        lane: suspect,
                        first_difference,
                    });
                }
                Verdict::Agreed => {}
            }

            if let Some(winner) = winner {
                accepted.push((output, std::mem::take(&mut buffers[winner.index()])));
            }
        }

        let mut arena = self.lock.write();
        for (output, bytes) in &accepted {
            arena.write(output, bytes)?;
        }
        Ok(())
    }
}

/// Hex dump of each lane's bytes around the first difference
fn window(buffers: &[Vec<u8>; LANE_COUNT], offset: usize) -> String {
    buffers
        .iter()
        .map(|b| {
            let start = offset.min(b.len());
            let end = (offset + 8).min(b.len());
            hex::encode(&b[start..end])
        })
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReplicaContext;
    use tmr_scheduler::{Scheduler, WorkItem};

    fn copy_input(ctx: &mut ReplicaContext<'_>) {
        let input = ctx.input(0).unwrap_or(&[]).to_vec();
        ctx.output().copy_from_slice(&input);
    }

    fn unpinned() -> EngineConfig {
        EngineConfig {
            pin_workers: false,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_outputs_committed_after_vote() {
        let mut arena = RegionArena::new();
        let items: Vec<WorkItem> = (0..8u8)
            .map(|i| {
                let input = arena.alloc_from(&[i; 16]).unwrap();
                WorkItem::single(input, arena.alloc(16).unwrap())
            })
            .collect();
        let mut plan = Scheduler::default().plan(&mut arena, &items).unwrap();
        let metrics = Metrics::new();

        let outcome =
            orchestrate(&mut arena, &mut plan, &copy_input, &unpinned(), &metrics).unwrap();

        assert_eq!(outcome.stages.len(), 1);
        assert!(outcome.unpinned_lanes.is_empty());
        for (i, item) in items.iter().enumerate() {
            assert_eq!(arena.read(&item.output).unwrap(), &[i as u8; 16][..]);
        }
        assert_eq!(metrics.counter_value(names::REPLICAS_EXECUTED), Some(24));
    }

    #[test]
    fn test_later_stage_sees_committed_output() {
        let mut arena = RegionArena::new();
        let source = arena.alloc_from(b"stage-0!").unwrap();
        let middle = arena.alloc(8).unwrap();
        let sink = arena.alloc(8).unwrap();
        let items = vec![
            WorkItem::single(source, middle),
            WorkItem::single(middle, sink),
        ];
        let mut plan = Scheduler::default().plan(&mut arena, &items).unwrap();
        assert_eq!(plan.stage_count(), 2);

        orchestrate(&mut arena, &mut plan, &copy_input, &unpinned(), &Metrics::new()).unwrap();

        assert_eq!(arena.read(&sink).unwrap(), b"stage-0!");
    }

    #[test]
    fn test_mismatch_aborts_remaining_stages() {
        let mut arena = RegionArena::new();
        let shared = arena.alloc(4).unwrap();
        let first_out = arena.alloc(4).unwrap();
        let items = vec![
            WorkItem::single(first_out, shared),
            WorkItem::single(arena.alloc(4).unwrap(), shared),
        ];
        let mut plan = Scheduler::default().plan(&mut arena, &items).unwrap();
        let metrics = Metrics::new();

        let corrupt_lane1 = |ctx: &mut ReplicaContext<'_>| {
            let lane = ctx.lane();
            ctx.output().fill(if lane == Lane::Lane1 { 0xFF } else { 0x01 });
        };
        let err =
            orchestrate(&mut arena, &mut plan, &corrupt_lane1, &unpinned(), &metrics).unwrap_err();

        assert_eq!(
            err,
            TmrError::ReplicaMismatch {
                item: ItemId(0),
                pairs: vec![
                    tmr_primitives::LanePair(Lane::Lane0, Lane::Lane1),
                    tmr_primitives::LanePair(Lane::Lane1, Lane::Lane2),
                ],
            }
        );
        assert_eq!(metrics.counter_value(names::MISMATCHES), Some(1));
        // the second stage never ran
        assert_eq!(metrics.counter_value(names::REPLICAS_EXECUTED), Some(3));
        assert_eq!(arena.read(&shared).unwrap(), &[0u8; 4][..]);
    }

    #[test]
    fn test_window_hex() {
        let buffers = [vec![0xAA, 0x01], vec![0xAA, 0x02], vec![0xAA]];
        assert_eq!(window(&buffers, 1), "01|02|");
    }
}
