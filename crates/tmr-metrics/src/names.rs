//! Metric names recorded by the engine

/// Histogram: time spent building a schedule plan (µs)
pub const PLAN_US: &str = "tmr.plan_us";
/// Histogram: wall time of one compute stage including its barrier (µs)
pub const STAGE_US: &str = "tmr.stage_us";
/// Histogram: time spent voting and committing one stage (µs)
pub const VOTE_US: &str = "tmr.vote_us";

/// Counter: completed `compute` calls
pub const RUNS: &str = "tmr.runs";
/// Counter: replicas executed by workers
pub const REPLICAS_EXECUTED: &str = "tmr.replicas_executed";
/// Counter: items whose lanes disagreed fatally
pub const MISMATCHES: &str = "tmr.mismatches";
/// Counter: lanes outvoted under the majority policy
pub const SUSPECTS: &str = "tmr.suspects";
/// Counter: processor panics
pub const PANICS: &str = "tmr.panics";
/// Counter: lanes that could not be pinned to their core
pub const UNPINNED_LANES: &str = "tmr.unpinned_lanes";

/// Gauge: compute sets used by the last run
pub const COMPUTE_SETS: &str = "tmr.compute_sets";
/// Gauge: hot regions duplicated by the last run
pub const HOT_REGIONS: &str = "tmr.hot_regions";
/// Gauge: conflict edges in the last run's graph
pub const CONFLICT_EDGES: &str = "tmr.conflict_edges";
