//! Lane workers
//!
//! Each lane has one worker thread draining its own queue. The orchestrator
//! is the only producer on every queue, the lane worker the only consumer.

use crate::affinity;
use crate::context::{Processor, ReplicaContext};
use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use tmr_primitives::{ArenaError, ItemId, Lane, MemorySpan, RegionArena, ReplicaId, LANE_COUNT};
use tracing::trace;

/// One replica to run
#[derive(Debug)]
pub(crate) struct Job {
    pub replica: ReplicaId,
    pub inputs: Vec<MemorySpan>,
    /// Private output buffer, moved to the worker and back through the outputs map
    pub buffer: Vec<u8>,
}

/// Messages on a lane queue
#[derive(Debug)]
pub(crate) enum LaneMessage {
    Run(Job),
    Shutdown,
}

/// Messages from workers back to the orchestrator
#[derive(Debug)]
pub(crate) enum LaneEvent {
    /// Worker is up; `pinned` tells whether core binding succeeded
    Started { lane: Lane, pinned: bool },
    Finished { replica: ReplicaId },
    Panicked { replica: ReplicaId, message: String },
    Failed { replica: ReplicaId, error: ArenaError },
}

/// Finished output buffers per item, indexed by lane
pub(crate) type LaneOutputs = DashMap<ItemId, [Option<Vec<u8>>; LANE_COUNT]>;

/// Arena shared between workers (readers) and the orchestrator (commits)
pub(crate) type ArenaLock<'a> = RwLock<&'a mut RegionArena>;

/// Shared state a worker borrows for the length of a run
pub(crate) struct LaneShared<'s, 'a, P: ?Sized> {
    pub arena: &'s ArenaLock<'a>,
    pub processor: &'s P,
    pub outputs: &'s LaneOutputs,
}

/// Worker loop for one lane
pub(crate) fn run_lane<P>(
    lane: Lane,
    core: Option<usize>,
    queue: Receiver<LaneMessage>,
    events: Sender<LaneEvent>,
    shared: LaneShared<'_, '_, P>,
) where
    P: Processor + ?Sized,
{
    let pinned = core.map(|core| affinity::pin_lane(lane, core)).unwrap_or(true);
    if events.send(LaneEvent::Started { lane, pinned }).is_err() {
        return;
    }

    // A closed queue means the orchestrator is gone; treat it like shutdown.
    while let Ok(LaneMessage::Run(job)) = queue.recv() {
        let event = execute(job, &shared);
        if events.send(event).is_err() {
            break;
        }
    }
    trace!(%lane, "lane worker exiting");
}

fn execute<P>(mut job: Job, shared: &LaneShared<'_, '_, P>) -> LaneEvent
where
    P: Processor + ?Sized,
{
    let replica = job.replica;
    let outcome = {
        let arena = shared.arena.read();
        let inputs: Result<Vec<&[u8]>, ArenaError> =
            job.inputs.iter().map(|span| arena.read(span)).collect();
        match inputs {
            Ok(inputs) => {
                let mut ctx = ReplicaContext::new(replica, inputs, &mut job.buffer);
                panic::catch_unwind(AssertUnwindSafe(|| shared.processor.process(&mut ctx)))
                    .map_err(|payload| panic_message(payload.as_ref()))
                    .map_err(|message| LaneEvent::Panicked { replica, message })
            }
            Err(error) => Err(LaneEvent::Failed { replica, error }),
        }
    };

    match outcome {
        Ok(()) => {
            let mut slots = shared.outputs.entry(replica.item).or_default();
            slots[replica.lane.index()] = Some(job.buffer);
            LaneEvent::Finished { replica }
        }
        Err(event) => event,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    fn copy_first(ctx: &mut ReplicaContext<'_>) {
        let input = ctx.input(0).unwrap_or(&[]).to_vec();
        ctx.output().copy_from_slice(&input);
    }

    #[test]
    fn test_lane_runs_jobs_until_shutdown() {
        let mut arena = RegionArena::new();
        let input = arena.alloc_from(b"abcd").unwrap();
        let lock = RwLock::new(&mut arena);
        let outputs = LaneOutputs::new();
        let (queue_tx, queue_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        thread::scope(|s| {
            let shared = LaneShared {
                arena: &lock,
                processor: &copy_first,
                outputs: &outputs,
            };
            s.spawn(|| run_lane(Lane::Lane1, None, queue_rx, event_tx, shared));

            let replica = ReplicaId::new(ItemId(0), Lane::Lane1);
            queue_tx
                .send(LaneMessage::Run(Job {
                    replica,
                    inputs: vec![input],
                    buffer: vec![0; 4],
                }))
                .unwrap();
            queue_tx.send(LaneMessage::Shutdown).unwrap();

            assert!(matches!(
                event_rx.recv().unwrap(),
                LaneEvent::Started { lane: Lane::Lane1, pinned: true }
            ));
            assert!(matches!(event_rx.recv().unwrap(), LaneEvent::Finished { .. }));
        });

        let entry = outputs.get(&ItemId(0)).unwrap();
        assert_eq!(entry[1].as_deref(), Some(&b"abcd"[..]));
        assert!(entry[0].is_none());
    }

    #[test]
    fn test_panicking_processor_reported() {
        let mut arena = RegionArena::new();
        let lock = RwLock::new(&mut arena);
        let outputs = LaneOutputs::new();
        let shared = LaneShared {
            arena: &lock,
            processor: &|_: &mut ReplicaContext<'_>| panic!("bad payload"),
            outputs: &outputs,
        };

        let replica = ReplicaId::new(ItemId(3), Lane::Lane0);
        let event = execute(
            Job {
                replica,
                inputs: vec![],
                buffer: vec![],
            },
            &shared,
        );

        match event {
            LaneEvent::Panicked { replica: r, message } => {
                assert_eq!(r, replica);
                assert_eq!(message, "bad payload");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_released_input_reported() {
        let mut arena = RegionArena::new();
        let input = arena.alloc(8).unwrap();
        arena.release(&input).unwrap();
        let lock = RwLock::new(&mut arena);
        let outputs = LaneOutputs::new();
        let shared = LaneShared {
            arena: &lock,
            processor: &copy_first,
            outputs: &outputs,
        };

        let event = execute(
            Job {
                replica: ReplicaId::new(ItemId(0), Lane::Lane2),
                inputs: vec![input],
                buffer: vec![0; 8],
            },
            &shared,
        );
        assert!(matches!(event, LaneEvent::Failed { .. }));
    }
}
