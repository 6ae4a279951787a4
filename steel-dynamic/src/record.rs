//! Dynamic update records and the handles that name them.

use std::cmp::Ordering;

use steel_utils::{BlockKey, ChunkKey};

/// A deferred update for one block of a region.
///
/// Records are plain values. Their membership in the scheduler (the link to
/// other records at the same block, the queue position) lives in the update
/// index, not in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateRecord {
    /// The region-local block this update is for.
    pub pos: BlockKey,
    /// The world age at which the update is due.
    pub update_time: u64,
    /// Opaque data handed back to the material.
    pub data: i32,
}

impl UpdateRecord {
    /// Creates a new update record.
    #[must_use]
    pub const fn new(pos: BlockKey, update_time: u64, data: i32) -> Self {
        Self {
            pos,
            update_time,
            data,
        }
    }

    /// The chunk this update belongs to.
    #[inline]
    #[must_use]
    pub const fn chunk_key(&self) -> ChunkKey {
        self.pos.chunk_key()
    }
}

/// Names a record stored in the update index.
///
/// Handles are generational: once the record is removed, the slot may be
/// reused, but the old handle stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Position of a record in the time-ordered queue.
///
/// Ordered by scheduled time, then by insertion sequence, then by handle, so
/// the order agrees with equality. The sequence is unique per index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueKey {
    pub update_time: u64,
    pub sequence: u64,
    pub handle: UpdateHandle,
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.update_time
            .cmp(&other.update_time)
            .then_with(|| self.sequence.cmp(&other.sequence))
            .then_with(|| self.handle.cmp(&other.handle))
    }
}
