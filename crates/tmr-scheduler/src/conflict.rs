//! Conflict graph between work items
//!
//! Two nodes are adjacent when their declared memory spans overlap. The
//! default builder sweeps span boundaries left to right, so construction is
//! O(n log n) in the number of spans plus the number of edges.

use crate::hot_region::HotRegionTable;
use crate::replica::Replica;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tmr_primitives::{ItemId, Lane, ReplicaId};

/// Undirected "touches the same memory" graph
///
/// Nodes keep their insertion order, which is the order greedy coloring
/// visits them in.
#[derive(Clone, Debug)]
pub struct ConflictGraph<N> {
    /// Nodes in insertion order
    nodes: Vec<N>,
    /// Symmetric adjacency
    adjacency: HashMap<N, HashSet<N>>,
    /// Number of undirected edges
    edges: usize,
}

impl<N: Copy + Eq + Hash> Default for ConflictGraph<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            adjacency: HashMap::new(),
            edges: 0,
        }
    }
}

impl<N: Copy + Eq + Hash> ConflictGraph<N> {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node (no-op if already present)
    pub fn add_node(&mut self, node: N) {
        if !self.adjacency.contains_key(&node) {
            self.adjacency.insert(node, HashSet::new());
            self.nodes.push(node);
        }
    }

    /// Add a conflict edge between two nodes, adding the nodes if needed
    ///
    /// Self-loops are ignored. Returns true if the edge is new.
    pub fn add_conflict(&mut self, a: N, b: N) -> bool {
        self.add_node(a);
        self.add_node(b);
        if a == b {
            return false;
        }
        let inserted = self.adjacency.get_mut(&a).is_some_and(|set| set.insert(b));
        if inserted {
            if let Some(set) = self.adjacency.get_mut(&b) {
                set.insert(a);
            }
            self.edges += 1;
        }
        inserted
    }

    /// Check whether two nodes conflict
    pub fn conflicts(&self, a: &N, b: &N) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(b))
    }

    /// Neighbors of a node
    pub fn neighbors(&self, node: &N) -> impl Iterator<Item = &N> {
        self.adjacency.get(node).into_iter().flatten()
    }

    /// Number of neighbors of a node
    pub fn degree(&self, node: &N) -> usize {
        self.adjacency.get(node).map(|set| set.len()).unwrap_or(0)
    }

    /// Check if a node is in the graph
    pub fn contains(&self, node: &N) -> bool {
        self.adjacency.contains_key(node)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    // Ends sort before starts at the same address, so touching spans do not conflict.
    End,
    Start,
}

/// Build the conflict graph of a replica set by sweeping span boundaries
///
/// Spans excluded by the hot-region table and empty spans emit no
/// boundaries. Sibling replicas of one item are never linked: they read
/// the same inputs and write private buffers.
pub fn build_conflict_graph(
    replicas: &[Replica],
    hot: &HotRegionTable,
) -> ConflictGraph<ReplicaId> {
    let mut graph = ConflictGraph::new();
    let mut events: Vec<(u32, usize, Boundary, usize)> = Vec::new();

    for (index, replica) in replicas.iter().enumerate() {
        graph.add_node(replica.id);
        let spans = replica
            .inputs
            .iter()
            .chain(std::iter::once(&replica.output))
            .filter(|span| !span.is_empty() && !hot.is_excluded(span));
        for span in spans {
            events.push((span.arena_id(), span.addr(), Boundary::Start, index));
            events.push((span.arena_id(), span.end(), Boundary::End, index));
        }
    }

    events.sort_unstable();

    // replica index -> number of its spans currently open
    let mut active: HashMap<usize, usize> = HashMap::new();
    for (_, _, boundary, index) in events {
        match boundary {
            Boundary::Start => {
                let id = replicas[index].id;
                for &other in active.keys() {
                    let other_id = replicas[other].id;
                    if other != index && !id.is_sibling_of(&other_id) {
                        graph.add_conflict(id, other_id);
                    }
                }
                *active.entry(index).or_insert(0) += 1;
            }
            Boundary::End => {
                if let Some(open) = active.get_mut(&index) {
                    *open -= 1;
                    if *open == 0 {
                        active.remove(&index);
                    }
                }
            }
        }
    }

    graph
}

/// Lift a graph over logical items to one over their replicas
///
/// Every replica of every item becomes a node; a logical edge (a, b) links
/// each replica of `a` with each replica of `b`.
pub fn lift_to_replicas(
    items: &ConflictGraph<ItemId>,
    replicas: &[Replica],
) -> ConflictGraph<ReplicaId> {
    let mut graph = ConflictGraph::new();
    for replica in replicas {
        graph.add_node(replica.id);
    }
    for &a in items.nodes() {
        for &b in items.neighbors(&a) {
            for lane_a in Lane::ALL {
                for lane_b in Lane::ALL {
                    graph.add_conflict(ReplicaId::new(a, lane_a), ReplicaId::new(b, lane_b));
                }
            }
        }
    }
    graph
}
