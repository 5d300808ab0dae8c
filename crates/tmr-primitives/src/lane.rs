//! Lane and identifier types

use std::fmt;

/// Number of redundant execution lanes
pub const LANE_COUNT: usize = 3;

/// One of the three fixed execution contexts
///
/// Every lane is served by exactly one worker thread, pinned to its own core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lane {
    /// First lane, keeps the caller's original memory
    Lane0,
    /// Second lane
    Lane1,
    /// Third lane
    Lane2,
}

impl Lane {
    /// All lanes in index order
    pub const ALL: [Lane; LANE_COUNT] = [Lane::Lane0, Lane::Lane1, Lane::Lane2];

    /// Get the lane index (0, 1 or 2)
    pub fn index(self) -> usize {
        match self {
            Lane::Lane0 => 0,
            Lane::Lane1 => 1,
            Lane::Lane2 => 2,
        }
    }

    /// Get the lane for an index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane{}", self.index())
    }
}

/// Logical work item identifier (position in the caller's dataset)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemId(pub u32);

impl ItemId {
    /// Create a new item ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the ID as a dataset index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ItemId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<usize> for ItemId {
    fn from(id: usize) -> Self {
        Self(id as u32)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Physical replica of a logical item, bound to one lane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplicaId {
    /// Logical item this replica executes
    pub item: ItemId,
    /// Lane the replica is bound to
    pub lane: Lane,
}

impl ReplicaId {
    /// Create a new replica ID
    pub fn new(item: ItemId, lane: Lane) -> Self {
        Self { item, lane }
    }

    /// Check whether two replicas execute the same logical item
    pub fn is_sibling_of(&self, other: &ReplicaId) -> bool {
        self.item == other.item && self.lane != other.lane
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item, self.lane)
    }
}

/// Pair of lanes compared during voting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LanePair(pub Lane, pub Lane);

impl LanePair {
    /// Comparison order used by the voter: (0,1), (1,2), (0,2)
    pub const ALL: [LanePair; 3] = [
        LanePair(Lane::Lane0, Lane::Lane1),
        LanePair(Lane::Lane1, Lane::Lane2),
        LanePair(Lane::Lane0, Lane::Lane2),
    ];

    /// Check whether the pair includes a lane
    pub fn contains(&self, lane: Lane) -> bool {
        self.0 == lane || self.1 == lane
    }
}

impl fmt::Display for LanePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.0, self.1)
    }
}
