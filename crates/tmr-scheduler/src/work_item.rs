//! Logical work items

use tmr_primitives::MemorySpan;

/// Atomic unit of scheduling
///
/// Declares which memory the item reads and the single span it writes.
/// Identity is positional: two items with identical spans are still two
/// distinct scheduling entities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Read-only input spans, in processor order
    pub inputs: Vec<MemorySpan>,
    /// Span receiving the accepted output
    pub output: MemorySpan,
}

impl WorkItem {
    /// Create a new work item
    pub fn new(inputs: Vec<MemorySpan>, output: MemorySpan) -> Self {
        Self { inputs, output }
    }

    /// Create a work item with a single input
    pub fn single(input: MemorySpan, output: MemorySpan) -> Self {
        Self::new(vec![input], output)
    }

    /// Iterate over every declared span, inputs first
    pub fn spans(&self) -> impl Iterator<Item = &MemorySpan> {
        self.inputs.iter().chain(std::iter::once(&self.output))
    }

    /// Bytes the item reads
    pub fn input_bytes(&self) -> usize {
        self.inputs.iter().map(|s| s.len()).sum()
    }
}
