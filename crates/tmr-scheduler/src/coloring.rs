//! Greedy coloring of the conflict graph into compute sets

use crate::conflict::ConflictGraph;
use crate::error::{SchedulerError, SchedulerResult};
use std::collections::HashMap;
use std::hash::Hash;

/// Assignment of every node to a compute set
///
/// Nodes sharing a color never conflict and may run concurrently. Colors
/// are dense, starting at 0.
#[derive(Clone, Debug)]
pub struct ComputeSets<N> {
    colors: HashMap<N, u16>,
    /// Members per color, in graph insertion order
    stages: Vec<Vec<N>>,
}

impl<N: Copy + Eq + Hash> ComputeSets<N> {
    /// Color a graph greedily in node insertion order
    ///
    /// Each node takes the smallest color unused by its already-colored
    /// neighbors. Isolated nodes therefore land in set 0. Fails if more than
    /// `max_sets` colors would be needed.
    pub fn color(graph: &ConflictGraph<N>, max_sets: usize) -> SchedulerResult<Self> {
        let max_sets = max_sets.min(u16::MAX as usize);
        let mut colors: HashMap<N, u16> = HashMap::with_capacity(graph.len());
        let mut stages: Vec<Vec<N>> = Vec::new();
        let mut taken: Vec<bool> = Vec::new();

        for &node in graph.nodes() {
            taken.clear();
            taken.resize(stages.len() + 1, false);
            for neighbor in graph.neighbors(&node) {
                if let Some(&c) = colors.get(neighbor) {
                    if let Some(slot) = taken.get_mut(c as usize) {
                        *slot = true;
                    }
                }
            }

            // at most `stages.len()` colors are taken, so a free slot exists
            let color = taken.iter().position(|t| !t).unwrap_or(stages.len());
            if color >= max_sets {
                return Err(SchedulerError::TooManyComputeSets { max: max_sets });
            }
            if color == stages.len() {
                stages.push(Vec::new());
            }
            stages[color].push(node);
            colors.insert(node, color as u16);
        }

        Ok(Self { colors, stages })
    }

    /// Compute set of a node
    pub fn color_of(&self, node: &N) -> Option<u16> {
        self.colors.get(node).copied()
    }

    /// Highest color in use, `None` for an empty graph
    pub fn max_color(&self) -> Option<u16> {
        self.stages.len().checked_sub(1).map(|c| c as u16)
    }

    /// Number of compute sets
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Members of one compute set
    pub fn stage(&self, color: usize) -> Option<&[N]> {
        self.stages.get(color).map(Vec::as_slice)
    }

    /// All compute sets in color order
    pub fn stages(&self) -> &[Vec<N>] {
        &self.stages
    }

    /// Consume into compute sets in color order
    pub fn into_stages(self) -> Vec<Vec<N>> {
        self.stages
    }

    /// Check that no edge joins two nodes of the same color
    pub fn is_proper(&self, graph: &ConflictGraph<N>) -> bool {
        graph.nodes().iter().all(|a| {
            graph
                .neighbors(a)
                .all(|b| self.color_of(a) != self.color_of(b))
        })
    }
}
