//! Replication manager
//!
//! Every logical item becomes three physical replicas, one per lane. Each
//! replica owns a private output buffer; nothing is written back to the
//! arena until the three buffers have been voted on.

use crate::error::{SchedulerError, SchedulerResult};
use crate::work_item::WorkItem;
use tmr_primitives::{ArenaError, ItemId, Lane, MemorySpan, ReplicaId, LANE_COUNT};

/// One physical copy of a logical work item
#[derive(Clone, Debug)]
pub struct Replica {
    /// Item and lane
    pub id: ReplicaId,
    /// Input spans (hot inputs may point at a lane-private copy)
    pub inputs: Vec<MemorySpan>,
    /// Logical output span the accepted result is committed to
    pub output: MemorySpan,
    /// Private output buffer, same length as `output`
    buffer: Vec<u8>,
}

impl Replica {
    /// Output buffer length
    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Move the output buffer out, leaving an empty one behind
    pub fn take_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Borrow the output buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

/// Index of a replica inside the vector built by [`replicate`]
pub fn replica_index(id: ReplicaId) -> usize {
    id.item.index() * LANE_COUNT + id.lane.index()
}

/// Triplicate a dataset
///
/// Replicas come out grouped by item, lanes in order, so
/// `replicas[replica_index(id)].id == id`.
pub fn replicate(dataset: &[WorkItem]) -> SchedulerResult<Vec<Replica>> {
    let mut replicas = Vec::new();
    replicas
        .try_reserve_exact(dataset.len() * LANE_COUNT)
        .map_err(|_| ArenaError::AllocationFailed {
            bytes: dataset.len() * LANE_COUNT * std::mem::size_of::<Replica>(),
        })?;

    for (index, item) in dataset.iter().enumerate() {
        let item_id = ItemId::from(index);
        for lane in Lane::ALL {
            replicas.push(Replica {
                id: ReplicaId::new(item_id, lane),
                inputs: item.inputs.clone(),
                output: item.output,
                buffer: output_buffer(item.output.len())?,
            });
        }
    }

    Ok(replicas)
}

fn output_buffer(len: usize) -> SchedulerResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SchedulerError::Arena(ArenaError::AllocationFailed { bytes: len }))?;
    buf.resize(len, 0);
    Ok(buf)
}
