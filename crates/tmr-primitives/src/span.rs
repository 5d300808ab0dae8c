//! Memory span handles

use crate::error::{ArenaError, ArenaResult};
use std::fmt;

/// Contiguous byte range inside a [`RegionArena`](crate::RegionArena)
///
/// A span is a view, not an owner. Fields are private so spans can only be
/// obtained from an arena or carved out of another span, which keeps every
/// span inside memory the arena actually holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemorySpan {
    arena: u32,
    addr: usize,
    len: usize,
}

impl MemorySpan {
    pub(crate) fn new(arena: u32, addr: usize, len: usize) -> Self {
        Self { arena, addr, len }
    }

    /// Arena this span belongs to
    pub fn arena_id(&self) -> u32 {
        self.arena
    }

    /// Logical start address
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logical end address (exclusive)
    pub fn end(&self) -> usize {
        self.addr + self.len
    }

    /// Carve a sub-span starting `offset` bytes into this span
    pub fn sub(&self, offset: usize, len: usize) -> ArenaResult<MemorySpan> {
        let end = offset.checked_add(len).ok_or(ArenaError::OutOfBounds {
            addr: self.addr.saturating_add(offset),
            len,
        })?;
        if end > self.len {
            return Err(ArenaError::OutOfBounds {
                addr: self.addr + offset.min(self.len),
                len,
            });
        }
        Ok(MemorySpan::new(self.arena, self.addr + offset, len))
    }

    /// Check whether two spans share at least one byte
    ///
    /// Ranges are half-open, so a span ending where another starts does not
    /// overlap it. Empty spans overlap nothing.
    pub fn overlaps(&self, other: &MemorySpan) -> bool {
        self.arena == other.arena
            && !self.is_empty()
            && !other.is_empty()
            && self.addr < other.end()
            && other.addr < self.end()
    }

    /// Check whether `other` lies entirely inside this span
    pub fn contains(&self, other: &MemorySpan) -> bool {
        self.arena == other.arena && other.addr >= self.addr && other.end() <= self.end()
    }
}

impl fmt::Debug for MemorySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemorySpan([{:#x}, {:#x}) @{})", self.addr, self.end(), self.arena)
    }
}
