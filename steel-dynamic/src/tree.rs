//! The per-region dynamic update tree.
//!
//! A [`DynamicUpdateTree`] is owned by its region and mutated only by the
//! region's executor. Other threads reach it through the shared
//! [`UpdateInbox`], which is folded in by [`DynamicUpdateTree::commit_pending`].

use std::iter;
use std::sync::Arc;
use std::thread::ThreadId;

use rustc_hash::FxHashSet;
use steel_utils::{BlockKey, ChunkKey};

use crate::error::{HookError, UpdateError, Violation, violated};
use crate::inbox::{ResetStatus, UpdateInbox};
use crate::index::UpdateIndex;
use crate::material::{ChunkState, DynamicBlock, RegionAccess};
use crate::outcome::UpdateResult;
use crate::record::{UpdateHandle, UpdateRecord};
use crate::stage::{StageToken, TickStage};

/// Returned by [`DynamicUpdateTree::first_update_time`] when nothing is queued.
pub const END_OF_THE_WORLD: u64 = u64::MAX;

/// Deferred block updates of one region.
#[derive(Debug, Default)]
pub struct DynamicUpdateTree {
    index: UpdateIndex,
    inbox: Arc<UpdateInbox>,
    region_thread: Option<ThreadId>,
    last_updates: usize,
}

impl DynamicUpdateTree {
    /// Creates an empty tree with no region thread.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The inbox other threads use to reach this tree.
    #[must_use]
    pub fn inbox(&self) -> &Arc<UpdateInbox> {
        &self.inbox
    }

    /// Records the thread that executes this region's local stages.
    pub fn set_region_thread(&mut self, thread: ThreadId) {
        self.region_thread = Some(thread);
    }

    /// The thread recorded by [`Self::set_region_thread`].
    #[must_use]
    pub fn region_thread(&self) -> Option<ThreadId> {
        self.region_thread
    }

    /// Number of queued updates, not counting the inbox.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no update is queued, not counting the inbox.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up a queued update. Executed or replaced updates resolve to `None`.
    #[must_use]
    pub fn get(&self, handle: UpdateHandle) -> Option<&UpdateRecord> {
        self.index.get(handle)
    }

    /// Queued updates of one block, earliest first.
    #[must_use]
    pub fn updates_at(&self, pos: BlockKey) -> Vec<UpdateRecord> {
        self.index.records_at(pos)
    }

    /// Audits the internal indexes.
    pub fn check_consistency(&self) -> Result<(), Violation> {
        self.index.check_consistency()
    }

    /// Schedules an update of `pos` at `update_time`.
    ///
    /// An update already queued for the same block and time is replaced. With
    /// `exclusive`, every update of the block is cleared first and the
    /// material's first update runs at the token's world age.
    ///
    /// # Panics
    /// Panics outside the update stages, or in a local stage off the region thread.
    pub fn queue_update<R: RegionAccess>(
        &mut self,
        token: &StageToken,
        region: &R,
        pos: BlockKey,
        update_time: u64,
        data: i32,
        exclusive: bool,
    ) -> Result<UpdateHandle, UpdateError> {
        self.check_update_stage(token, "queue_update");
        if exclusive {
            self.reset_block(token, region, pos, token.world_age())?;
        }
        let (handle, previous) = self.index.add(UpdateRecord::new(pos, update_time, data));
        if let Some(previous) = previous {
            log::trace!(
                "Replaced dynamic update at {pos} for {update_time} (data {} -> {data})",
                previous.data
            );
        }
        Ok(handle)
    }

    /// Schedules an update of `pos` that is due immediately.
    pub fn queue_update_now<R: RegionAccess>(
        &mut self,
        token: &StageToken,
        region: &R,
        pos: BlockKey,
        exclusive: bool,
    ) -> Result<UpdateHandle, UpdateError> {
        self.queue_update(token, region, pos, 0, 0, exclusive)
    }

    /// Clears every update of one block without running any hook.
    ///
    /// Returns how many updates were removed.
    pub fn sync_reset_block(&mut self, token: &StageToken, pos: BlockKey) -> usize {
        self.check_update_stage(token, "sync_reset_block");
        self.index.remove_all(pos).len()
    }

    /// Folds the inbox into the tree.
    ///
    /// Staged update lists are merged first, then queued resets are applied.
    /// A block is reset at most once per commit, even when a point reset and a
    /// chunk reset both cover it. Resets requested by hooks while the commit
    /// runs are left queued for the next commit.
    ///
    /// # Panics
    /// Panics unless called in [`TickStage::DYNAMIC_BLOCKS`] on the region thread.
    pub fn commit_pending<R: RegionAccess>(
        &mut self,
        token: &StageToken,
        region: &R,
        current_time: u64,
    ) -> Result<(), UpdateError> {
        self.check_stage(
            token,
            TickStage::empty(),
            TickStage::DYNAMIC_BLOCKS,
            "commit_pending",
        );

        let mut merged = 0;
        while let Some(list) = self.inbox.pop_pending_list() {
            merged += list.len();
            for record in list {
                self.index.add(record);
            }
        }

        // Requests made by hooks during this commit wait for the next one
        let batch: Vec<_> = iter::from_fn(|| self.inbox.pop_reset()).collect();
        let resets = batch.len();
        let mut processed = FxHashSet::default();
        for (key, status) in batch {
            match status {
                ResetStatus::PointPending => {
                    if processed.insert(key) {
                        self.reset_block(token, region, key, current_time)?;
                    }
                }
                ResetStatus::AreaPending => {
                    for pos in key.chunk_key().blocks() {
                        if processed.insert(pos) {
                            self.reset_block(token, region, pos, current_time)?;
                        }
                    }
                }
                ResetStatus::None => violated(Violation::ResetMismatch(key)),
            }
        }

        if merged > 0 || resets > 0 {
            log::debug!("Committed {merged} staged updates and {resets} resets at {current_time}");
        }
        Ok(())
    }

    /// Executes every update due at or before `threshold_time`, earliest first.
    ///
    /// Updates whose material may reach outside the region are not executed;
    /// they are returned for the global phase.
    pub fn drain_due<R: RegionAccess>(
        &mut self,
        token: &StageToken,
        region: &R,
        current_time: u64,
        threshold_time: u64,
    ) -> Result<Vec<UpdateRecord>, UpdateError> {
        self.check_update_stage(token, "drain_due");
        let mut deferred = Vec::new();
        while let Some(record) = self.index.pop_due(threshold_time) {
            let result = self.execute(token, region, current_time, record, false)?;
            if !result.is_local() {
                deferred.push(record);
            }
        }
        if !deferred.is_empty() {
            log::trace!(
                "Deferred {} dynamic updates to the global phase",
                deferred.len()
            );
        }
        Ok(deferred)
    }

    /// Executes one update that has already left the queue.
    ///
    /// Nothing is loaded to do so: updates of chunks that are not loaded or
    /// populated, and of blocks that are no longer dynamic, are dropped. With
    /// `force`, the region-locality check is skipped.
    pub fn execute<R: RegionAccess>(
        &mut self,
        token: &StageToken,
        region: &R,
        current_time: u64,
        record: UpdateRecord,
        force: bool,
    ) -> Result<UpdateResult, UpdateError> {
        self.check_update_stage(token, "execute");
        let pos = record.pos;
        let chunk = record.chunk_key();

        match region.chunk_state(chunk) {
            ChunkState::Unloaded => return Ok(UpdateResult::NotLoaded),
            ChunkState::Unpopulated => return Ok(UpdateResult::NotPopulated),
            ChunkState::Populated => {}
        }
        let Some(material) = region.dynamic_material(pos) else {
            return Ok(UpdateResult::NotDynamic);
        };
        if !force && !material.dynamic_range().is_region_local(pos) {
            return Ok(UpdateResult::NonLocal);
        }

        log::trace!(
            "Dynamic update at {pos} due {} running at {current_time}",
            record.update_time
        );
        region.mark_modified(chunk);
        let mut block = DynamicBlock::new(pos, region, self, token);
        material
            .on_dynamic_update(&mut block, record.update_time, record.data)
            .map_err(|source| hook_failed(material.type_name(), pos, source))?;
        self.last_updates += 1;
        Ok(UpdateResult::Done)
    }

    /// The earliest queued update time, or [`END_OF_THE_WORLD`].
    ///
    /// Besides the update stages, any thread may ask at
    /// [`TickStage::TICKSTART`], before region work begins.
    pub fn first_update_time(&self, token: &StageToken) -> u64 {
        self.check_stage(
            token,
            TickStage::GLOBAL_UPDATES.union(TickStage::TICKSTART),
            TickStage::LOCAL_UPDATES,
            "first_update_time",
        );
        self.index
            .first()
            .map_or(END_OF_THE_WORLD, |record| record.update_time)
    }

    /// Takes the earliest update if it is due at or before `threshold_time`.
    pub fn next_update(&mut self, token: &StageToken, threshold_time: u64) -> Option<UpdateRecord> {
        self.check_update_stage(token, "next_update");
        self.index.pop_due(threshold_time)
    }

    /// Number of updates executed since the last reset of the counter.
    #[must_use]
    pub fn last_updates(&self) -> usize {
        self.last_updates
    }

    /// Zeroes the executed-update counter.
    pub fn reset_last_updates(&mut self) {
        self.last_updates = 0;
    }

    /// Queued updates of one chunk in execution order, for saving the chunk.
    ///
    /// # Panics
    /// Panics outside [`TickStage::SNAPSHOT`].
    pub fn updates_in_chunk(&self, token: &StageToken, chunk: ChunkKey) -> Vec<UpdateRecord> {
        self.check_stage(token, TickStage::SNAPSHOT, TickStage::empty(), "updates_in_chunk");
        self.index.records_in_chunk(chunk)
    }

    /// Drops every queued update of one chunk, for unloading it.
    ///
    /// # Panics
    /// Panics unless called in [`TickStage::SNAPSHOT`] on the region thread.
    pub fn remove_chunk_updates(&mut self, token: &StageToken, chunk: ChunkKey) -> usize {
        self.check_stage(
            token,
            TickStage::empty(),
            TickStage::SNAPSHOT,
            "remove_chunk_updates",
        );
        let removed = self.index.remove_chunk(chunk);
        if removed > 0 {
            log::debug!("Removed {removed} dynamic updates of unloading chunk {chunk}");
        }
        removed
    }

    /// Clears one block and runs its material's first update.
    ///
    /// The hook only runs when the chunk is loaded and the block is dynamic.
    fn reset_block<R: RegionAccess>(
        &mut self,
        token: &StageToken,
        region: &R,
        pos: BlockKey,
        current_time: u64,
    ) -> Result<(), UpdateError> {
        self.index.remove_all(pos);
        if region.chunk_state(pos.chunk_key()) == ChunkState::Unloaded {
            return Ok(());
        }
        let Some(material) = region.dynamic_material(pos) else {
            return Ok(());
        };
        let mut block = DynamicBlock::new(pos, region, self, token);
        material
            .on_first_update(&mut block, current_time)
            .map_err(|source| hook_failed(material.type_name(), pos, source))
    }

    fn check_update_stage(&self, token: &StageToken, operation: &'static str) {
        self.check_stage(
            token,
            TickStage::GLOBAL_UPDATES,
            TickStage::LOCAL_UPDATES,
            operation,
        );
    }

    fn check_stage(
        &self,
        token: &StageToken,
        any_thread: TickStage,
        owner_only: TickStage,
        operation: &'static str,
    ) {
        if !token.permits(any_thread, owner_only, self.region_thread) {
            violated(Violation::Stage {
                operation,
                stage: token.stage(),
            });
        }
    }
}

fn hook_failed(material: &'static str, pos: BlockKey, source: HookError) -> UpdateError {
    log::error!("Unable to execute dynamic update for {material} at {pos}: {source}");
    UpdateError::Hook {
        material,
        pos,
        source,
    }
}
