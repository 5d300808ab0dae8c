//! Region arena owning all memory a scheduling run can touch
//!
//! Blocks are laid out in one logical address space that only grows, so
//! overlap between spans can be decided by comparing addresses, and a span
//! pointing at a released block can never alias a newer one.

use crate::error::{ArenaError, ArenaResult};
use crate::span::MemorySpan;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

/// Owner of the byte blocks that memory spans point into
#[derive(Debug)]
pub struct RegionArena {
    /// Arena identity stamped into every span it hands out
    id: u32,
    /// Live blocks keyed by base address
    blocks: BTreeMap<usize, Box<[u8]>>,
    /// Next unused logical address
    next_addr: usize,
    /// Bytes held by live blocks
    live_bytes: usize,
}

impl RegionArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            blocks: BTreeMap::new(),
            next_addr: 0,
            live_bytes: 0,
        }
    }

    /// Arena identity
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Allocate a zeroed block of `len` bytes
    pub fn alloc(&mut self, len: usize) -> ArenaResult<MemorySpan> {
        let mut buf = reserve(len)?;
        buf.resize(len, 0);
        self.insert_block(buf)
    }

    /// Allocate a block initialised with `data`
    pub fn alloc_from(&mut self, data: &[u8]) -> ArenaResult<MemorySpan> {
        let mut buf = reserve(data.len())?;
        buf.extend_from_slice(data);
        self.insert_block(buf)
    }

    /// Allocate a new block holding a byte-identical copy of `span`
    pub fn duplicate(&mut self, span: &MemorySpan) -> ArenaResult<MemorySpan> {
        let mut buf = reserve(span.len())?;
        buf.extend_from_slice(self.read(span)?);
        self.insert_block(buf)
    }

    /// Release a whole block
    ///
    /// Its address range is retired, not recycled.
    pub fn release(&mut self, span: &MemorySpan) -> ArenaResult<()> {
        self.check_owner(span)?;
        if span.is_empty() {
            return Ok(());
        }
        match self.blocks.get(&span.addr()) {
            Some(block) if block.len() == span.len() => {
                self.blocks.remove(&span.addr());
                self.live_bytes -= span.len();
                Ok(())
            }
            _ => Err(ArenaError::NotABlock {
                addr: span.addr(),
                len: span.len(),
            }),
        }
    }

    /// Borrow the bytes behind a span
    pub fn read(&self, span: &MemorySpan) -> ArenaResult<&[u8]> {
        self.check_owner(span)?;
        if span.is_empty() {
            return Ok(&[]);
        }
        let (base, block) = self.locate(span)?;
        let start = span.addr() - base;
        Ok(&block[start..start + span.len()])
    }

    /// Mutably borrow the bytes behind a span
    pub fn read_mut(&mut self, span: &MemorySpan) -> ArenaResult<&mut [u8]> {
        self.check_owner(span)?;
        if span.is_empty() {
            return Ok(&mut []);
        }
        let (base, _) = self.locate(span)?;
        let start = span.addr() - base;
        let block = self.blocks.get_mut(&base).ok_or(ArenaError::OutOfBounds {
            addr: span.addr(),
            len: span.len(),
        })?;
        Ok(&mut block[start..start + span.len()])
    }

    /// Overwrite the bytes behind a span
    pub fn write(&mut self, span: &MemorySpan, data: &[u8]) -> ArenaResult<()> {
        if data.len() != span.len() {
            return Err(ArenaError::LengthMismatch {
                expected: span.len(),
                got: data.len(),
            });
        }
        self.read_mut(span)?.copy_from_slice(data);
        Ok(())
    }

    /// Copy the bytes behind `src` into `dst`
    ///
    /// Both spans must have the same length. They may overlap.
    pub fn copy_within_arena(&mut self, src: &MemorySpan, dst: &MemorySpan) -> ArenaResult<()> {
        if src.len() != dst.len() {
            return Err(ArenaError::LengthMismatch {
                expected: dst.len(),
                got: src.len(),
            });
        }
        let data = self.read(src)?.to_vec();
        self.write(dst, &data)
    }

    /// Check whether a span points at live memory of this arena
    pub fn contains(&self, span: &MemorySpan) -> bool {
        self.read(span).is_ok()
    }

    /// Number of live blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes held by live blocks
    pub fn allocated_bytes(&self) -> usize {
        self.live_bytes
    }

    fn check_owner(&self, span: &MemorySpan) -> ArenaResult<()> {
        if span.arena_id() != self.id {
            return Err(ArenaError::ForeignSpan {
                expected: self.id,
                found: span.arena_id(),
            });
        }
        Ok(())
    }

    fn locate(&self, span: &MemorySpan) -> ArenaResult<(usize, &[u8])> {
        let out_of_bounds = ArenaError::OutOfBounds {
            addr: span.addr(),
            len: span.len(),
        };
        let (base, block) = self
            .blocks
            .range(..=span.addr())
            .next_back()
            .ok_or_else(|| out_of_bounds.clone())?;
        if span.end() > base + block.len() {
            return Err(out_of_bounds);
        }
        Ok((*base, block))
    }

    fn insert_block(&mut self, buf: Vec<u8>) -> ArenaResult<MemorySpan> {
        let len = buf.len();
        let addr = self.next_addr;
        if len == 0 {
            return Ok(MemorySpan::new(self.id, addr, 0));
        }
        self.next_addr = addr
            .checked_add(len)
            .ok_or(ArenaError::AddressSpaceExhausted)?;
        self.blocks.insert(addr, buf.into_boxed_slice());
        self.live_bytes += len;
        Ok(MemorySpan::new(self.id, addr, len))
    }
}

impl Default for RegionArena {
    fn default() -> Self {
        Self::new()
    }
}

fn reserve(len: usize) -> ArenaResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| ArenaError::AllocationFailed { bytes: len })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_block_starts_at_zero() {
        let mut arena = RegionArena::new();
        let a = arena.alloc(5120).unwrap();
        let b = arena.alloc(16).unwrap();

        assert_eq!(a.addr(), 0);
        assert_eq!(b.addr(), 5120);
        assert!(!a.overlaps(&b));
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.allocated_bytes(), 5136);
    }

    #[test]
    fn test_sub_span_read_write() {
        let mut arena = RegionArena::new();
        let block = arena.alloc(64).unwrap();
        let part = block.sub(8, 4).unwrap();

        arena.write(&part, &[1, 2, 3, 4]).unwrap();

        let all = arena.read(&block).unwrap();
        assert_eq!(&all[8..12], &[1, 2, 3, 4]);
        assert_eq!(all[7], 0);
        assert_eq!(all[12], 0);
    }

    #[test]
    fn test_write_length_mismatch() {
        let mut arena = RegionArena::new();
        let span = arena.alloc(4).unwrap();
        let err = arena.write(&span, &[0u8; 5]).unwrap_err();
        assert_eq!(err, ArenaError::LengthMismatch { expected: 4, got: 5 });
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut arena = RegionArena::new();
        let original = arena.alloc_from(b"hot region").unwrap();
        let copy = arena.duplicate(&original).unwrap();

        assert!(!copy.overlaps(&original));
        assert_eq!(arena.read(&copy).unwrap(), b"hot region");

        arena.write(&original, b"HOT REGION").unwrap();
        assert_eq!(arena.read(&copy).unwrap(), b"hot region");
    }

    #[test]
    fn test_copy_within_arena_overlapping() {
        let mut arena = RegionArena::new();
        let block = arena.alloc_from(&[1, 2, 3, 4, 5, 6]).unwrap();

        let src = block.sub(0, 4).unwrap();
        let dst = block.sub(2, 4).unwrap();
        arena.copy_within_arena(&src, &dst).unwrap();

        assert_eq!(arena.read(&block).unwrap(), &[1u8, 2, 1, 2, 3, 4][..]);
        assert!(arena
            .copy_within_arena(&src, &block.sub(0, 3).unwrap())
            .is_err());
    }

    #[test]
    fn test_release_retires_addresses() {
        let mut arena = RegionArena::new();
        let a = arena.alloc(32).unwrap();
        arena.release(&a).unwrap();

        assert!(!arena.contains(&a));
        assert_eq!(arena.allocated_bytes(), 0);

        let b = arena.alloc(32).unwrap();
        assert!(!a.overlaps(&b));
        assert!(arena.read(&a).is_err());
    }

    #[test]
    fn test_release_requires_whole_block() {
        let mut arena = RegionArena::new();
        let block = arena.alloc(32).unwrap();
        let part = block.sub(0, 16).unwrap();

        assert!(matches!(
            arena.release(&part),
            Err(ArenaError::NotABlock { .. })
        ));
    }

    #[test]
    fn test_foreign_span_rejected() {
        let mut a = RegionArena::new();
        let b = RegionArena::new();
        let span = a.alloc(8).unwrap();

        assert!(matches!(b.read(&span), Err(ArenaError::ForeignSpan { .. })));
    }

    #[test]
    fn test_zero_length_alloc() {
        let mut arena = RegionArena::new();
        let empty = arena.alloc(0).unwrap();
        let next = arena.alloc(8).unwrap();

        assert!(empty.is_empty());
        assert_eq!(arena.read(&empty).unwrap(), &[] as &[u8]);
        assert_eq!(next.addr(), empty.addr());
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn test_huge_alloc_fails_cleanly() {
        let mut arena = RegionArena::new();
        let err = arena.alloc(usize::MAX).unwrap_err();
        assert_eq!(err, ArenaError::AllocationFailed { bytes: usize::MAX });
    }
}
