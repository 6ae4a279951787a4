//! The tri-index holding a region's pending dynamic updates.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use steel_utils::{BlockKey, ChunkKey};

use crate::error::{Violation, violated};
use crate::record::{QueueKey, UpdateHandle, UpdateRecord};

/// A stored record plus its link to the next record at the same block.
#[derive(Debug)]
struct Entry {
    record: UpdateRecord,
    sequence: u64,
    next: Option<UpdateHandle>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Pending updates of one region, kept in three views that must agree:
///
/// - `queue`: every record, ordered by scheduled time then insertion order
/// - `blocks`: for each block, the head of a chain of its records, ascending by time
/// - `chunks`: for each chunk, the set of its records
///
/// Records live in a slab and are named by generational handles, so the block
/// chains are handle links rather than pointers. Any disagreement between the
/// views is reported as a [`Violation`] and panics.
#[derive(Debug, Default)]
pub struct UpdateIndex {
    slots: Vec<Slot>,
    free: Vec<u32>,
    queue: BTreeSet<QueueKey>,
    blocks: FxHashMap<BlockKey, UpdateHandle>,
    chunks: FxHashMap<ChunkKey, FxHashSet<UpdateHandle>>,
    next_sequence: u64,
}

impl UpdateIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Looks up a record by handle. Stale handles resolve to `None`.
    #[must_use]
    pub fn get(&self, handle: UpdateHandle) -> Option<&UpdateRecord> {
        self.entry(handle).map(|entry| &entry.record)
    }

    /// Adds a record.
    ///
    /// A record already stored for the same block and the same time is
    /// removed first and returned; the new record replaces it.
    pub fn add(&mut self, record: UpdateRecord) -> (UpdateHandle, Option<UpdateRecord>) {
        let key = record.pos;

        let mut previous = None;
        let mut current = self.blocks.get(&key).copied();
        while let Some(handle) = current {
            let Some(entry) = self.entry(handle) else {
                violated(Violation::DanglingHandle(key));
            };
            if entry.record.update_time == record.update_time {
                let Some(old) = self.remove(handle) else {
                    violated(Violation::ExpectedUpdateMissing(key));
                };
                previous = Some(old);
                break;
            }
            current = entry.next;
        }

        // Find the splice point, keeping the chain ordered by time
        let mut before = None;
        let mut after = self.blocks.get(&key).copied();
        while let Some(handle) = after {
            let Some(entry) = self.entry(handle) else {
                violated(Violation::DanglingHandle(key));
            };
            if entry.record.update_time > record.update_time {
                break;
            }
            before = Some(handle);
            after = entry.next;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let handle = self.allocate(Entry {
            record,
            sequence,
            next: after,
        });

        match before {
            Some(b) => {
                if let Some(entry) = self.entry_mut(b) {
                    entry.next = Some(handle);
                }
            }
            None => {
                self.blocks.insert(key, handle);
            }
        }
        self.queue.insert(QueueKey {
            update_time: record.update_time,
            sequence,
            handle,
        });
        self.chunks
            .entry(record.chunk_key())
            .or_default()
            .insert(handle);

        (handle, previous)
    }

    /// Removes one record from all three views.
    ///
    /// Returns `None` for a stale handle.
    ///
    /// # Panics
    /// Panics if the record is live but missing from any view.
    pub fn remove(&mut self, handle: UpdateHandle) -> Option<UpdateRecord> {
        let entry = self.entry(handle)?;
        let (record, sequence, next) = (entry.record, entry.sequence, entry.next);
        let key = record.pos;

        let mut previous = None;
        let mut current = self.blocks.get(&key).copied();
        loop {
            match current {
                Some(h) if h == handle => break,
                Some(h) => {
                    let Some(entry) = self.entry(h) else {
                        violated(Violation::DanglingHandle(key));
                    };
                    previous = Some(h);
                    current = entry.next;
                }
                None => violated(Violation::MissingFromChain(key)),
            }
        }

        let mut rest = next;
        while let Some(h) = rest {
            if h == handle {
                violated(Violation::DuplicateInChain(key));
            }
            rest = self.entry(h).and_then(|entry| entry.next);
        }

        match previous {
            Some(p) => {
                if let Some(entry) = self.entry_mut(p) {
                    entry.next = next;
                }
            }
            None => match next {
                Some(n) => {
                    self.blocks.insert(key, n);
                }
                None => {
                    self.blocks.remove(&key);
                }
            },
        }

        self.unqueue(record, sequence, handle);
        self.release(handle);
        Some(record)
    }

    /// Removes every record of one block, returning them in chain order.
    ///
    /// # Panics
    /// Panics if a chained record is missing from the queue or its chunk.
    pub fn remove_all(&mut self, key: BlockKey) -> SmallVec<[UpdateRecord; 4]> {
        let mut removed = SmallVec::new();
        let mut current = self.blocks.remove(&key);
        while let Some(handle) = current {
            let Some(entry) = self.entry(handle) else {
                violated(Violation::DanglingHandle(key));
            };
            let (record, sequence, next) = (entry.record, entry.sequence, entry.next);
            self.unqueue(record, sequence, handle);
            self.release(handle);
            removed.push(record);
            current = next;
        }
        removed
    }

    /// The earliest record, if any.
    #[must_use]
    pub fn first(&self) -> Option<&UpdateRecord> {
        let first = self.queue.first()?;
        self.get(first.handle)
    }

    /// Removes and returns the earliest record if it is due at or before `threshold`.
    ///
    /// # Panics
    /// Panics if the queue head names a removed record.
    pub fn pop_due(&mut self, threshold: u64) -> Option<UpdateRecord> {
        let first = *self.queue.first()?;
        if first.update_time > threshold {
            return None;
        }
        match self.remove(first.handle) {
            Some(record) => Some(record),
            None => violated(Violation::StaleQueueEntry(first.update_time)),
        }
    }

    /// Records at one block, in chain (time) order.
    #[must_use]
    pub fn records_at(&self, key: BlockKey) -> Vec<UpdateRecord> {
        let mut records = Vec::new();
        let mut current = self.blocks.get(&key).copied();
        while let Some(entry) = current.and_then(|h| self.entry(h)) {
            records.push(entry.record);
            current = entry.next;
        }
        records
    }

    /// Records of one chunk, in queue order.
    #[must_use]
    pub fn records_in_chunk(&self, chunk: ChunkKey) -> Vec<UpdateRecord> {
        let Some(set) = self.chunks.get(&chunk) else {
            return Vec::new();
        };
        let mut entries: Vec<&Entry> = set.iter().filter_map(|&h| self.entry(h)).collect();
        entries.sort_unstable_by_key(|entry| (entry.record.update_time, entry.sequence));
        entries.into_iter().map(|entry| entry.record).collect()
    }

    /// Removes every record of one chunk, returning how many were removed.
    ///
    /// # Panics
    /// Panics if a record of the chunk set cannot be removed.
    pub fn remove_chunk(&mut self, chunk: ChunkKey) -> usize {
        let Some(set) = self.chunks.get(&chunk) else {
            return 0;
        };
        let handles: Vec<UpdateHandle> = set.iter().copied().collect();
        for &handle in &handles {
            if self.remove(handle).is_none() {
                violated(Violation::ExpectedUpdateMissing(chunk.base()));
            }
        }
        handles.len()
    }

    /// Audits the three views against each other.
    ///
    /// Every chained record must be queued and in its chunk set exactly once,
    /// and all three views must hold the same number of records.
    pub fn check_consistency(&self) -> Result<(), Violation> {
        let mut seen = FxHashSet::default();
        for (&key, &head) in &self.blocks {
            let mut current = Some(head);
            while let Some(handle) = current {
                let Some(entry) = self.entry(handle) else {
                    return Err(Violation::DanglingHandle(key));
                };
                if entry.record.pos != key {
                    return Err(Violation::MissingFromChain(entry.record.pos));
                }
                if !seen.insert(handle) {
                    return Err(Violation::DuplicateInChain(key));
                }
                let queued = QueueKey {
                    update_time: entry.record.update_time,
                    sequence: entry.sequence,
                    handle,
                };
                if self.queue.get(&queued).map(|q| q.handle) != Some(handle) {
                    return Err(Violation::MissingFromQueue(key));
                }
                let chunk = entry.record.chunk_key();
                if !self.chunks.get(&chunk).is_some_and(|set| set.contains(&handle)) {
                    return Err(Violation::MissingFromChunk { pos: key, chunk });
                }
                current = entry.next;
            }
        }

        let chunked: usize = self.chunks.values().map(FxHashSet::len).sum();
        if seen.len() != self.queue.len() || chunked != self.queue.len() {
            return Err(Violation::SizeMismatch {
                queue: self.queue.len(),
                chained: seen.len(),
                chunked,
            });
        }
        Ok(())
    }

    fn entry(&self, handle: UpdateHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: UpdateHandle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn allocate(&mut self, entry: Entry) -> UpdateHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return UpdateHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        UpdateHandle {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, handle: UpdateHandle) {
        let slot = &mut self.slots[handle.index as usize];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    /// Drops a record from the queue and its chunk set.
    fn unqueue(&mut self, record: UpdateRecord, sequence: u64, handle: UpdateHandle) {
        let key = record.pos;
        let queued = QueueKey {
            update_time: record.update_time,
            sequence,
            handle,
        };
        if !self.queue.remove(&queued) {
            violated(Violation::MissingFromQueue(key));
        }

        let chunk = record.chunk_key();
        let Some(set) = self.chunks.get_mut(&chunk) else {
            violated(Violation::MissingFromChunk { pos: key, chunk });
        };
        if !set.remove(&handle) {
            violated(Violation::MissingFromChunk { pos: key, chunk });
        }
        if set.is_empty() {
            self.chunks.remove(&chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: i32, y: i32, z: i32, time: u64) -> UpdateRecord {
        UpdateRecord::new(BlockKey::new(x, y, z), time, 0)
    }

    #[test]
    fn test_add_and_pop_in_time_order() {
        let mut index = UpdateIndex::new();
        for (i, time) in [5, 3, 9, 3].into_iter().enumerate() {
            index.add(record(i as i32, 0, 0, time));
        }
        assert_eq!(index.len(), 4);
        index.check_consistency().expect("consistent after adds");

        let mut drained = Vec::new();
        while let Some(r) = index.pop_due(6) {
            drained.push(r.update_time);
        }
        assert_eq!(drained, vec![3, 3, 5]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.first().map(|r| r.update_time), Some(9));
        index.check_consistency().expect("consistent after drain");
    }

    #[test]
    fn test_equal_times_drain_in_insertion_order() {
        let mut index = UpdateIndex::new();
        index.add(record(9, 0, 0, 3));
        index.add(record(1, 0, 0, 3));
        assert_eq!(index.pop_due(3).map(|r| r.pos), Some(BlockKey::new(9, 0, 0)));
        assert_eq!(index.pop_due(3).map(|r| r.pos), Some(BlockKey::new(1, 0, 0)));
    }

    #[test]
    fn test_same_block_same_time_coalesces() {
        let mut index = UpdateIndex::new();
        let first = UpdateRecord::new(BlockKey::new(1, 2, 3), 10, 1);
        let second = UpdateRecord::new(BlockKey::new(1, 2, 3), 10, 2);

        let (old_handle, previous) = index.add(first);
        assert_eq!(previous, None);
        let (_, previous) = index.add(second);
        assert_eq!(previous, Some(first));

        assert_eq!(index.len(), 1);
        assert_eq!(index.records_at(first.pos), vec![second]);
        assert_eq!(index.get(old_handle), None);
        index.check_consistency().expect("consistent after coalescing");
    }

    #[test]
    fn test_chain_is_time_ordered() {
        let mut index = UpdateIndex::new();
        let pos = BlockKey::new(4, 4, 4);
        for time in [30, 10, 20] {
            index.add(UpdateRecord::new(pos, time, 0));
        }
        let times: Vec<u64> = index.records_at(pos).iter().map(|r| r.update_time).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_remove_middle_of_chain() {
        let mut index = UpdateIndex::new();
        let pos = BlockKey::new(4, 4, 4);
        index.add(UpdateRecord::new(pos, 10, 0));
        let (middle, _) = index.add(UpdateRecord::new(pos, 20, 0));
        index.add(UpdateRecord::new(pos, 30, 0));

        assert_eq!(index.remove(middle).map(|r| r.update_time), Some(20));
        assert_eq!(index.remove(middle), None);

        let times: Vec<u64> = index.records_at(pos).iter().map(|r| r.update_time).collect();
        assert_eq!(times, vec![10, 30]);
        index.check_consistency().expect("consistent after removal");
    }

    #[test]
    fn test_remove_all_at_block() {
        let mut index = UpdateIndex::new();
        let pos = BlockKey::new(4, 4, 4);
        index.add(UpdateRecord::new(pos, 10, 0));
        index.add(UpdateRecord::new(pos, 20, 0));
        index.add(record(5, 4, 4, 15));

        let removed = index.remove_all(pos);
        assert_eq!(removed.len(), 2);
        assert_eq!(index.len(), 1);
        assert!(index.records_at(pos).is_empty());
        assert!(index.remove_all(pos).is_empty());
        index.check_consistency().expect("consistent after remove_all");
    }

    #[test]
    fn test_remove_chunk_clears_queue() {
        let mut index = UpdateIndex::new();
        let chunk = ChunkKey::new(0, 0, 0);
        index.add(record(1, 1, 1, 5));
        index.add(record(15, 15, 15, 7));
        index.add(record(16, 0, 0, 6));

        assert_eq!(index.records_in_chunk(chunk).len(), 2);
        assert_eq!(index.remove_chunk(chunk), 2);
        assert!(index.records_in_chunk(chunk).is_empty());

        let mut remaining = Vec::new();
        while let Some(r) = index.pop_due(u64::MAX) {
            remaining.push(r);
        }
        assert!(remaining.iter().all(|r| r.chunk_key() != chunk));
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_slots_are_reused_with_new_generation() {
        let mut index = UpdateIndex::new();
        let (first, _) = index.add(record(1, 1, 1, 5));
        index.remove(first);
        let (second, _) = index.add(record(2, 2, 2, 5));
        assert_eq!(first.index, second.index);
        assert_ne!(first, second);
        assert_eq!(index.get(first), None);
        assert!(index.get(second).is_some());
    }

    /// An index with one record at `pos` whose queue entry has been lost.
    fn index_missing_queue_entry(pos: BlockKey) -> (UpdateIndex, UpdateHandle) {
        let mut index = UpdateIndex::new();
        let (handle, _) = index.add(UpdateRecord::new(pos, 4, 0));
        let queued = *index.queue.first().expect("record is queued");
        index.queue.remove(&queued);
        (index, handle)
    }

    /// An index with one record at `pos` that its chunk set no longer holds.
    fn index_missing_chunk_entry(pos: BlockKey) -> UpdateIndex {
        let mut index = UpdateIndex::new();
        let (handle, _) = index.add(UpdateRecord::new(pos, 4, 0));
        let set = index
            .chunks
            .get_mut(&pos.chunk_key())
            .expect("chunk set exists");
        set.remove(&handle);
        index
    }

    #[test]
    fn test_consistency_reports_lost_queue_entry() {
        let pos = BlockKey::new(3, 3, 3);
        let (index, _) = index_missing_queue_entry(pos);
        assert!(matches!(
            index.check_consistency(),
            Err(Violation::MissingFromQueue(key)) if key == pos
        ));
    }

    #[test]
    #[should_panic(expected = "missing from the update queue")]
    fn test_remove_with_lost_queue_entry_panics() {
        let (mut index, handle) = index_missing_queue_entry(BlockKey::new(3, 3, 3));
        index.remove(handle);
    }

    #[test]
    fn test_consistency_reports_lost_chunk_entry() {
        let pos = BlockKey::new(20, 1, 2);
        let index = index_missing_chunk_entry(pos);
        assert!(matches!(
            index.check_consistency(),
            Err(Violation::MissingFromChunk { pos: key, chunk })
                if key == pos && chunk == pos.chunk_key()
        ));
    }

    #[test]
    #[should_panic(expected = "missing from chunk")]
    fn test_pop_with_lost_chunk_entry_panics() {
        let mut index = index_missing_chunk_entry(BlockKey::new(20, 1, 2));
        index.pop_due(u64::MAX);
    }
}
