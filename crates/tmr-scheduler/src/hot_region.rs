//! Hot-region duplicator
//!
//! An input span shared by a large fraction of the dataset would otherwise
//! link almost every item in the conflict graph. Instead, lanes 1 and 2 get
//! private byte-identical copies (lane 0 keeps the original) and the span is
//! left out of conflict detection altogether.

use crate::config::SchedulerConfig;
use crate::error::SchedulerResult;
use crate::replica::Replica;
use std::collections::{BTreeMap, HashMap, HashSet};
use tmr_primitives::{ItemId, Lane, MemorySpan, RegionArena};
use tracing::debug;

/// A duplicated input span
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HotRegion {
    /// Span read by lane 0
    pub original: MemorySpan,
    /// Private copies read by lanes 1 and 2
    pub copies: [MemorySpan; 2],
    /// Number of distinct items referencing the span when it was duplicated
    pub references: usize,
}

impl HotRegion {
    /// Span a lane should read in place of the original
    pub fn span_for(&self, lane: Lane) -> MemorySpan {
        match lane {
            Lane::Lane0 => self.original,
            Lane::Lane1 => self.copies[0],
            Lane::Lane2 => self.copies[1],
        }
    }
}

/// Hot regions of one scheduling run
#[derive(Debug, Default)]
pub struct HotRegionTable {
    regions: Vec<HotRegion>,
    /// Original and copy spans, mapped to their region
    excluded: HashMap<MemorySpan, usize>,
}

impl HotRegionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect hot inputs, allocate lane copies and rebind lanes 1 and 2
    ///
    /// Spans already known to the table are skipped, so running this again
    /// over the rewritten replicas changes nothing. Returns the number of
    /// newly duplicated spans. An allocation failure is returned as is; the
    /// copies made so far stay in the table and are freed by [`release`].
    ///
    /// [`release`]: HotRegionTable::release
    pub fn duplicate(
        &mut self,
        arena: &mut RegionArena,
        replicas: &mut [Replica],
        config: &SchedulerConfig,
    ) -> SchedulerResult<usize> {
        let candidates = self.detect(replicas, config);
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut rebind: HashMap<MemorySpan, usize> = HashMap::new();
        for (original, references) in candidates {
            let first = arena.duplicate(&original)?;
            let second = match arena.duplicate(&original) {
                Ok(span) => span,
                Err(e) => {
                    arena.release(&first)?;
                    return Err(e.into());
                }
            };
            let copies = [first, second];
            let index = self.regions.len();
            self.regions.push(HotRegion {
                original,
                copies,
                references,
            });
            self.excluded.insert(original, index);
            self.excluded.insert(copies[0], index);
            self.excluded.insert(copies[1], index);
            rebind.insert(original, index);

            debug!(
                addr = original.addr(),
                len = original.len(),
                references,
                "duplicated hot region"
            );
        }

        for replica in replicas.iter_mut() {
            let lane = replica.id.lane;
            if lane == Lane::Lane0 {
                continue;
            }
            for input in replica.inputs.iter_mut() {
                if let Some(&index) = rebind.get(input) {
                    *input = self.regions[index].span_for(lane);
                }
            }
        }

        Ok(rebind.len())
    }

    /// Spans that qualify as hot, with their reference counts, in address order
    fn detect(&self, replicas: &[Replica], config: &SchedulerConfig) -> Vec<(MemorySpan, usize)> {
        let mut users: BTreeMap<MemorySpan, HashSet<ItemId>> = BTreeMap::new();
        let mut items: HashSet<ItemId> = HashSet::new();
        let mut outputs: Vec<MemorySpan> = Vec::new();

        for replica in replicas {
            if items.insert(replica.id.item) {
                outputs.push(replica.output);
            }
            for input in &replica.inputs {
                if input.is_empty() || self.excluded.contains_key(input) {
                    continue;
                }
                users.entry(*input).or_default().insert(replica.id.item);
            }
        }

        let limit = config.hot_region_threshold * items.len() as f64;
        users
            .into_iter()
            .map(|(span, users)| (span, users.len()))
            .filter(|&(span, references)| {
                references >= config.min_hot_references
                    && references as f64 > limit
                    && !outputs.iter().any(|out| out.overlaps(&span))
            })
            .collect()
    }

    /// Check whether a span is left out of conflict detection
    pub fn is_excluded(&self, span: &MemorySpan) -> bool {
        self.excluded.contains_key(span)
    }

    /// Region that owns a span, if the span is an original or a copy
    pub fn region_of(&self, span: &MemorySpan) -> Option<&HotRegion> {
        self.excluded.get(span).map(|&i| &self.regions[i])
    }

    /// All duplicated regions
    pub fn regions(&self) -> &[HotRegion] {
        &self.regions
    }

    /// Number of duplicated regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if nothing was duplicated
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Free every copy and forget all regions
    pub fn release(&mut self, arena: &mut RegionArena) -> SchedulerResult<()> {
        for region in self.regions.drain(..) {
            for copy in &region.copies {
                arena.release(copy)?;
            }
        }
        self.excluded.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::replicate;
    use crate::work_item::WorkItem;

    fn shared_dataset(
        arena: &mut RegionArena,
        total: usize,
        sharing: usize,
    ) -> (Vec<WorkItem>, MemorySpan) {
        let shared = arena.alloc_from(&[0xAB; 4096]).unwrap();
        let items = (0..total)
            .map(|i| {
                let input = if i < sharing {
                    shared
                } else {
                    arena.alloc(4096).unwrap()
                };
                WorkItem::single(input, arena.alloc(64).unwrap())
            })
            .collect();
        (items, shared)
    }

    #[test]
    fn test_shared_span_is_duplicated() {
        let mut arena = RegionArena::new();
        let (items, shared) = shared_dataset(&mut arena, 100, 90);
        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();

        let config = SchedulerConfig::with_hot_region_threshold(0.5);
        let count = table.duplicate(&mut arena, &mut replicas, &config).unwrap();

        assert_eq!(count, 1);
        let region = &table.regions()[0];
        assert_eq!(region.original, shared);
        assert_eq!(region.references, 90);
        assert_eq!(arena.read(&region.copies[0]).unwrap(), &[0xABu8; 4096][..]);
        assert_eq!(arena.read(&region.copies[1]).unwrap(), &[0xABu8; 4096][..]);
    }

    #[test]
    fn test_lanes_rebound_to_private_copies() {
        let mut arena = RegionArena::new();
        let (items, shared) = shared_dataset(&mut arena, 10, 10);
        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();

        table
            .duplicate(&mut arena, &mut replicas, &SchedulerConfig::default())
            .unwrap();
        let region = table.region_of(&shared).unwrap().clone();

        for replica in &replicas {
            assert_eq!(replica.inputs[0], region.span_for(replica.id.lane));
            assert!(table.is_excluded(&replica.inputs[0]));
        }
    }

    #[test]
    fn test_below_threshold_not_duplicated() {
        let mut arena = RegionArena::new();
        let (items, shared) = shared_dataset(&mut arena, 100, 40);
        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();

        let config = SchedulerConfig::with_hot_region_threshold(0.5);
        let count = table.duplicate(&mut arena, &mut replicas, &config).unwrap();

        assert_eq!(count, 0);
        assert!(!table.is_excluded(&shared));
    }

    #[test]
    fn test_single_user_span_never_hot() {
        let mut arena = RegionArena::new();
        let (items, _) = shared_dataset(&mut arena, 2, 0);
        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();

        let config = SchedulerConfig::with_hot_region_threshold(0.0);
        assert_eq!(table.duplicate(&mut arena, &mut replicas, &config).unwrap(), 0);
    }

    #[test]
    fn test_span_overlapping_an_output_is_not_hot() {
        let mut arena = RegionArena::new();
        let block = arena.alloc(128).unwrap();
        let shared = block.sub(0, 64).unwrap();
        let writer_out = block.sub(32, 64).unwrap();

        let mut items: Vec<WorkItem> = (0..4)
            .map(|_| WorkItem::single(shared, arena.alloc(8).unwrap()))
            .collect();
        items.push(WorkItem::new(vec![], writer_out));

        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();
        let config = SchedulerConfig::with_hot_region_threshold(0.1);

        assert_eq!(table.duplicate(&mut arena, &mut replicas, &config).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        let mut arena = RegionArena::new();
        let (items, _) = shared_dataset(&mut arena, 20, 20);
        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();
        let config = SchedulerConfig::default();

        assert_eq!(table.duplicate(&mut arena, &mut replicas, &config).unwrap(), 1);
        let blocks = arena.block_count();
        let before: Vec<_> = replicas.iter().map(|r| r.inputs.clone()).collect();

        assert_eq!(table.duplicate(&mut arena, &mut replicas, &config).unwrap(), 0);
        let after: Vec<_> = replicas.iter().map(|r| r.inputs.clone()).collect();

        assert_eq!(before, after);
        assert_eq!(arena.block_count(), blocks);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_frees_copies() {
        let mut arena = RegionArena::new();
        let (items, shared) = shared_dataset(&mut arena, 10, 10);
        let mut replicas = replicate(&items).unwrap();
        let mut table = HotRegionTable::new();
        table
            .duplicate(&mut arena, &mut replicas, &SchedulerConfig::default())
            .unwrap();
        let copies = table.regions()[0].copies;

        table.release(&mut arena).unwrap();

        assert!(table.is_empty());
        assert!(!table.is_excluded(&shared));
        assert!(arena.contains(&shared));
        assert!(!arena.contains(&copies[0]));
        assert!(!arena.contains(&copies[1]));
    }
}
