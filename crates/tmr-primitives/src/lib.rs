//! # tmr-primitives
//!
//! Primitive types for the triple-modular-redundant scheduler.
//!
//! This crate provides the identifiers and the memory model used throughout
//! the system: execution lanes, logical item and replica identifiers, and
//! bounds-checked memory spans handed out by a [`RegionArena`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod arena;
mod error;
mod lane;
mod span;

pub use arena::RegionArena;
pub use error::{ArenaError, ArenaResult};
pub use lane::{ItemId, Lane, LanePair, ReplicaId, LANE_COUNT};
pub use span::MemorySpan;

/// Cache line size assumed when walking buffers line by line
pub const CACHE_LINE: usize = 64;
