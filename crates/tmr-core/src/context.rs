//! Processor and partitioner interfaces

use tmr_primitives::{ItemId, Lane, ReplicaId};
use tmr_scheduler::{ConflictGraph, WorkItem};

/// View a processor gets of one replica
///
/// Inputs are the lane's view of the item's input spans (hot inputs
/// resolve to the lane's private copy). The output is the replica's
/// private buffer, zeroed before the call.
pub struct ReplicaContext<'a> {
    replica: ReplicaId,
    inputs: Vec<&'a [u8]>,
    output: &'a mut [u8],
}

impl<'a> ReplicaContext<'a> {
    pub(crate) fn new(replica: ReplicaId, inputs: Vec<&'a [u8]>, output: &'a mut [u8]) -> Self {
        Self {
            replica,
            inputs,
            output,
        }
    }

    /// Replica being executed
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Logical item
    pub fn item(&self) -> ItemId {
        self.replica.item
    }

    /// Lane running the replica
    pub fn lane(&self) -> Lane {
        self.replica.lane
    }

    /// Number of inputs
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Bytes of input `index`
    pub fn input(&self, index: usize) -> Option<&[u8]> {
        self.inputs.get(index).copied()
    }

    /// All inputs in declaration order
    pub fn inputs(&self) -> &[&'a [u8]] {
        &self.inputs
    }

    /// Output buffer
    pub fn output(&mut self) -> &mut [u8] {
        &mut *self.output
    }
}

/// Work run on every replica
///
/// Must be deterministic in its inputs: the three lanes are compared
/// byte for byte.
pub trait Processor: Sync {
    /// Fill `ctx.output()` from `ctx.inputs()`
    fn process(&self, ctx: &mut ReplicaContext<'_>);
}

impl<F> Processor for F
where
    F: Fn(&mut ReplicaContext<'_>) + Sync,
{
    fn process(&self, ctx: &mut ReplicaContext<'_>) {
        self(ctx)
    }
}

/// Caller-supplied conflict detection over logical items
pub trait Partitioner {
    /// Conflict graph of the dataset; absent items are conflict-free
    fn partition(&self, dataset: &[WorkItem]) -> ConflictGraph<ItemId>;
}

impl<F> Partitioner for F
where
    F: Fn(&[WorkItem]) -> ConflictGraph<ItemId>,
{
    fn partition(&self, dataset: &[WorkItem]) -> ConflictGraph<ItemId> {
        self(dataset)
    }
}
