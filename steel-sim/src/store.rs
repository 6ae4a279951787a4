//! RAM-only chunk storage.
//!
//! Unloaded chunks keep their blocks and their pending dynamic updates here
//! until they are loaded again. Nothing is written to disk.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use steel_dynamic::UpdateRecord;
use steel_utils::ChunkPos;

use crate::chunk::Block;

/// A chunk as it was when it was unloaded.
#[derive(Debug, Clone)]
pub struct SavedChunk {
    /// The chunk's blocks.
    pub blocks: Box<[Block]>,
    /// Updates that were pending for the chunk, in execution order.
    pub updates: Vec<UpdateRecord>,
}

/// In-memory chunk storage.
#[derive(Default)]
pub struct RamUpdateStore {
    saved: RwLock<FxHashMap<ChunkPos, SavedChunk>>,
}

impl RamUpdateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a chunk, replacing an older save.
    pub fn save(&self, pos: ChunkPos, chunk: SavedChunk) {
        log::debug!(
            "Saved chunk {pos} with {} pending updates",
            chunk.updates.len()
        );
        self.saved.write().insert(pos, chunk);
    }

    /// Takes a saved chunk out of the store.
    pub fn take(&self, pos: ChunkPos) -> Option<SavedChunk> {
        self.saved.write().remove(&pos)
    }

    /// Returns true if a chunk is saved at `pos`.
    #[must_use]
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.saved.read().contains_key(&pos)
    }

    /// Number of saved chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.read().len()
    }

    /// Returns true if nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.read().is_empty()
    }
}
