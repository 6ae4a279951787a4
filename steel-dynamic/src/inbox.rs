//! Staging area for requests made from outside the region thread.
//!
//! Any thread may push update lists and reset requests here. Nothing is
//! applied until the region thread commits the inbox into its update tree.

use std::fmt;

use crossbeam::queue::SegQueue;
use steel_utils::{BlockKey, ChunkKey};

use crate::error::{Violation, violated};
use crate::record::UpdateRecord;

/// How much of the world a reset request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// One block.
    Block,
    /// Every block of a chunk.
    Chunk,
}

impl ResetScope {
    const fn pending_status(self) -> ResetStatus {
        match self {
            Self::Block => ResetStatus::PointPending,
            Self::Chunk => ResetStatus::AreaPending,
        }
    }
}

/// Reset state of a coordinate.
///
/// A chunk request is keyed by the chunk's base block, so a point request at
/// that block and the chunk request share one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetStatus {
    /// No reset pending.
    #[default]
    None,
    /// A single-block reset is pending.
    PointPending,
    /// A whole-chunk reset is pending.
    AreaPending,
}

impl ResetStatus {
    /// The status after a request of `scope`, or `None` when the request is
    /// absorbed by what is already pending.
    ///
    /// A chunk request always wins over a point request; anything arriving
    /// while a chunk reset is pending is a no-op.
    #[must_use]
    pub const fn on_request(self, scope: ResetScope) -> Option<Self> {
        match (self, scope) {
            (Self::None, _) => Some(scope.pending_status()),
            (Self::PointPending, ResetScope::Chunk) => Some(Self::AreaPending),
            (Self::PointPending, ResetScope::Block) | (Self::AreaPending, _) => None,
        }
    }
}

/// Lock-free inbox of one region's update tree.
///
/// The reset queue carries coordinates only. The status map owns the kind of
/// each pending reset, so upgrading a point reset to a chunk reset rewrites
/// the map entry and never adds a second queue entry.
pub struct UpdateInbox {
    /// Lists of updates waiting to be merged, mostly from freshly loaded chunks.
    pending_lists: SegQueue<Vec<UpdateRecord>>,
    /// Coordinates with a pending reset, in request order.
    reset_queue: SegQueue<BlockKey>,
    /// Pending reset kind per queued coordinate.
    reset_status: scc::HashMap<BlockKey, ResetStatus>,
}

impl UpdateInbox {
    /// Creates an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending_lists: SegQueue::new(),
            reset_queue: SegQueue::new(),
            reset_status: scc::HashMap::new(),
        }
    }

    /// Requests a reset of one block: its queued updates are cleared and the
    /// material's first update runs at the next commit.
    pub fn request_reset_block(&self, pos: BlockKey) {
        self.request_reset(pos, ResetScope::Block);
    }

    /// Requests a reset of every block of a chunk.
    pub fn request_reset_chunk(&self, chunk: ChunkKey) {
        self.request_reset(chunk.base(), ResetScope::Chunk);
    }

    fn request_reset(&self, key: BlockKey, scope: ResetScope) {
        loop {
            if self
                .reset_status
                .insert_sync(key, scope.pending_status())
                .is_ok()
            {
                self.reset_queue.push(key);
                return;
            }

            // Already pending, upgrade in place. A miss means a commit took
            // the entry after our insert failed, so start over.
            let upgraded = self.reset_status.update_sync(&key, |_, status| {
                if let Some(next) = status.on_request(scope) {
                    *status = next;
                }
            });
            if upgraded.is_some() {
                return;
            }
        }
    }

    /// The reset state of a coordinate.
    #[must_use]
    pub fn reset_status(&self, pos: BlockKey) -> ResetStatus {
        self.reset_status
            .read_sync(&pos, |_, status| *status)
            .unwrap_or_default()
    }

    /// Number of queued reset requests.
    #[must_use]
    pub fn pending_resets(&self) -> usize {
        self.reset_queue.len()
    }

    /// Stages updates restored from a saved chunk. Empty lists are ignored.
    pub fn add_persisted_updates(&self, updates: Vec<UpdateRecord>) {
        if !updates.is_empty() {
            self.pending_lists.push(updates);
        }
    }

    /// Stages a single update for the next commit.
    pub fn stage_update(&self, pos: BlockKey, update_time: u64, data: i32) {
        self.pending_lists
            .push(vec![UpdateRecord::new(pos, update_time, data)]);
    }

    /// Number of staged update lists.
    #[must_use]
    pub fn pending_lists(&self) -> usize {
        self.pending_lists.len()
    }

    pub(crate) fn pop_pending_list(&self) -> Option<Vec<UpdateRecord>> {
        self.pending_lists.pop()
    }

    /// Takes the next reset request together with its kind.
    ///
    /// # Panics
    /// Panics if a queued coordinate has no pending status.
    pub(crate) fn pop_reset(&self) -> Option<(BlockKey, ResetStatus)> {
        let key = self.reset_queue.pop()?;
        match self.reset_status.remove_sync(&key) {
            Some((_, status)) => Some((key, status)),
            None => violated(Violation::ResetMismatch(key)),
        }
    }
}

impl fmt::Debug for UpdateInbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateInbox")
            .field("pending_lists", &self.pending_lists())
            .field("pending_resets", &self.pending_resets())
            .finish()
    }
}

impl Default for UpdateInbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_status_transitions() {
        use ResetScope::{Block, Chunk};
        use ResetStatus::{AreaPending, None as Absent, PointPending};

        assert_eq!(Absent.on_request(Block), Some(PointPending));
        assert_eq!(Absent.on_request(Chunk), Some(AreaPending));
        assert_eq!(PointPending.on_request(Chunk), Some(AreaPending));
        assert_eq!(PointPending.on_request(Block), None);
        assert_eq!(AreaPending.on_request(Block), None);
        assert_eq!(AreaPending.on_request(Chunk), None);
    }

    #[test]
    fn test_duplicate_point_requests() {
        let inbox = UpdateInbox::new();
        let pos = BlockKey::new(3, 4, 5);
        inbox.request_reset_block(pos);
        inbox.request_reset_block(pos);

        assert_eq!(inbox.pending_resets(), 1);
        assert_eq!(inbox.reset_status.len(), 1);
        assert_eq!(inbox.reset_status(pos), ResetStatus::PointPending);
    }

    #[test]
    fn test_chunk_request_upgrades_point() {
        let inbox = UpdateInbox::new();
        let chunk = ChunkKey::new(1, 1, 1);
        inbox.request_reset_block(chunk.base());
        inbox.request_reset_chunk(chunk);

        assert_eq!(inbox.pending_resets(), 1);
        assert_eq!(inbox.reset_status(chunk.base()), ResetStatus::AreaPending);

        // Point requests after the upgrade change nothing
        inbox.request_reset_block(chunk.base());
        assert_eq!(inbox.pending_resets(), 1);
        assert_eq!(inbox.pop_reset(), Some((chunk.base(), ResetStatus::AreaPending)));
        assert_eq!(inbox.pop_reset(), None);
        assert_eq!(inbox.reset_status(chunk.base()), ResetStatus::None);
    }

    #[test]
    fn test_request_after_commit_queues_again() {
        let inbox = UpdateInbox::new();
        let pos = BlockKey::new(0, 0, 1);
        inbox.request_reset_block(pos);
        assert!(inbox.pop_reset().is_some());

        inbox.request_reset_block(pos);
        assert_eq!(inbox.pending_resets(), 1);
    }

    #[test]
    fn test_concurrent_requests_deduplicate() {
        let inbox = UpdateInbox::new();
        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for x in 0..64 {
                        inbox.request_reset_block(BlockKey::new(x, 0, 0));
                    }
                    inbox.request_reset_chunk(ChunkKey::new(0, 0, 0));
                });
            }
        });

        assert_eq!(inbox.pending_resets(), 64);
        assert_eq!(inbox.reset_status(BlockKey::new(0, 0, 0)), ResetStatus::AreaPending);
        assert_eq!(inbox.reset_status(BlockKey::new(1, 0, 0)), ResetStatus::PointPending);
    }

    #[test]
    fn test_empty_persisted_list_is_ignored() {
        let inbox = UpdateInbox::new();
        inbox.add_persisted_updates(Vec::new());
        assert_eq!(inbox.pending_lists(), 0);

        inbox.add_persisted_updates(vec![UpdateRecord::new(BlockKey::new(1, 1, 1), 4, 0)]);
        inbox.stage_update(BlockKey::new(2, 2, 2), 5, 1);
        assert_eq!(inbox.pending_lists(), 2);
    }

    #[test]
    #[should_panic(expected = "reset pending map and queue mismatch")]
    fn test_queued_reset_without_status_panics() {
        let inbox = UpdateInbox::new();
        inbox.reset_queue.push(BlockKey::new(1, 2, 3));
        inbox.pop_reset();
    }
}
