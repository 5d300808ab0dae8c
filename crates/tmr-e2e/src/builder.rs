//! Dataset builder for declarative test construction

use tmr_core::WorkItem;
use tmr_primitives::MemorySpan;

/// Builder for constructing datasets declaratively
#[derive(Clone, Debug, Default)]
pub struct DatasetBuilder {
    items: Vec<WorkItem>,
}

impl DatasetBuilder {
    /// Start an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item reading `inputs` and writing `output`
    pub fn item(
        mut self,
        inputs: impl IntoIterator<Item = MemorySpan>,
        output: MemorySpan,
    ) -> Self {
        self.items.push(WorkItem::new(inputs.into_iter().collect(), output));
        self
    }

    /// Add a single-input item
    pub fn map(self, input: MemorySpan, output: MemorySpan) -> Self {
        self.item([input], output)
    }

    /// Add one item per output, all reading the same span
    pub fn fan_out(mut self, shared: MemorySpan, outputs: &[MemorySpan]) -> Self {
        for output in outputs {
            self = self.map(shared, *output);
        }
        self
    }

    /// Add a pipeline: `seed -> cells[0] -> cells[1] -> ...`
    pub fn chain(mut self, seed: MemorySpan, cells: &[MemorySpan]) -> Self {
        let mut previous = seed;
        for cell in cells {
            self = self.map(previous, *cell);
            previous = *cell;
        }
        self
    }

    /// Number of items added so far
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if no items were added
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finish the dataset
    pub fn build(self) -> Vec<WorkItem> {
        self.items
    }
}
