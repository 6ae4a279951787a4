//! Block storage of one region and the directory linking regions together.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use steel_dynamic::{ChunkState, DynamicMaterial, RegionAccess, UpdateInbox};
use steel_utils::{BlockKey, BlockPos, ChunkKey, RegionPos};

use crate::chunk::{Block, SimChunk};
use crate::materials::MaterialRegistry;

/// Every region of the world, by position.
///
/// Lets a material reach blocks of a neighbouring region when its update is
/// executed in the global phase.
pub struct RegionDirectory {
    regions: scc::HashMap<RegionPos, Arc<RegionBlocks>>,
}

impl RegionDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regions: scc::HashMap::new(),
        }
    }

    /// Registers a region. A region already registered at the same position is kept.
    pub fn insert(&self, blocks: Arc<RegionBlocks>) {
        let _ = self.regions.insert_sync(blocks.pos(), blocks);
    }

    /// The region at `pos`.
    #[must_use]
    pub fn get(&self, pos: RegionPos) -> Option<Arc<RegionBlocks>> {
        self.regions.read_sync(&pos, |_, blocks| blocks.clone())
    }
}

impl Default for RegionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// The loaded chunks of one region.
///
/// Hooks run with a shared reference to this, so every chunk access goes
/// through a lock that is never held while a hook runs.
pub struct RegionBlocks {
    pos: RegionPos,
    chunks: RwLock<FxHashMap<ChunkKey, SimChunk>>,
    materials: Arc<MaterialRegistry>,
    inbox: Arc<UpdateInbox>,
    directory: Weak<RegionDirectory>,
}

impl RegionBlocks {
    /// Creates an empty region whose placements report to `inbox`.
    #[must_use]
    pub fn new(
        pos: RegionPos,
        materials: Arc<MaterialRegistry>,
        inbox: Arc<UpdateInbox>,
        directory: Weak<RegionDirectory>,
    ) -> Self {
        Self {
            pos,
            chunks: RwLock::new(FxHashMap::default()),
            materials,
            inbox,
            directory,
        }
    }

    /// Position of this region.
    #[must_use]
    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    /// World position of a block of this region.
    #[must_use]
    pub fn world_pos(&self, key: BlockKey) -> BlockPos {
        self.pos.block_pos(key)
    }

    /// Returns true if the chunk is in memory.
    #[must_use]
    pub fn is_loaded(&self, chunk: ChunkKey) -> bool {
        self.chunks.read().contains_key(&chunk)
    }

    /// Number of chunks in memory.
    #[must_use]
    pub fn loaded_chunks(&self) -> usize {
        self.chunks.read().len()
    }

    /// Adds a chunk, returning the one it replaced.
    pub fn insert_chunk(&self, chunk: ChunkKey, data: SimChunk) -> Option<SimChunk> {
        self.chunks.write().insert(chunk, data)
    }

    /// Removes a chunk from memory.
    pub fn remove_chunk(&self, chunk: ChunkKey) -> Option<SimChunk> {
        self.chunks.write().remove(&chunk)
    }

    /// The block at `key`, or `None` if its chunk is not loaded.
    #[must_use]
    pub fn block(&self, key: BlockKey) -> Option<Block> {
        self.chunks
            .read()
            .get(&key.chunk_key())
            .map(|chunk| chunk.block(key))
    }

    /// Overwrites a block without touching its scheduled updates.
    ///
    /// Returns false if the chunk is not loaded.
    pub fn set_block(&self, key: BlockKey, block: Block) -> bool {
        match self.chunks.write().get_mut(&key.chunk_key()) {
            Some(chunk) => {
                chunk.set_block(key, block);
                true
            }
            None => false,
        }
    }

    /// Places a block and requests a reset of its updates, so a dynamic block
    /// gets its first update at the next commit.
    ///
    /// Returns false if the chunk is not loaded.
    pub fn place_block(&self, key: BlockKey, block: Block) -> bool {
        if !self.set_block(key, block) {
            return false;
        }
        self.inbox.request_reset_block(key);
        true
    }

    /// The block at a world position, in this region or a neighbouring one.
    #[must_use]
    pub fn block_at(&self, pos: BlockPos) -> Option<Block> {
        if pos.region_pos() == self.pos {
            return self.block(pos.key());
        }
        self.neighbour(pos.region_pos())?.block(pos.key())
    }

    /// Places a block at a world position, in this region or a neighbouring one.
    pub fn place_block_at(&self, pos: BlockPos, block: Block) -> bool {
        if pos.region_pos() == self.pos {
            return self.place_block(pos.key(), block);
        }
        self.neighbour(pos.region_pos())
            .is_some_and(|region| region.place_block(pos.key(), block))
    }

    fn neighbour(&self, pos: RegionPos) -> Option<Arc<RegionBlocks>> {
        self.directory.upgrade()?.get(pos)
    }
}

impl RegionAccess for RegionBlocks {
    fn chunk_state(&self, chunk: ChunkKey) -> ChunkState {
        match self.chunks.read().get(&chunk) {
            None => ChunkState::Unloaded,
            Some(data) if !data.is_populated() => ChunkState::Unpopulated,
            Some(_) => ChunkState::Populated,
        }
    }

    fn dynamic_material(&self, pos: BlockKey) -> Option<Arc<dyn DynamicMaterial<Self>>> {
        self.materials.material_for(self.block(pos)?)
    }

    fn mark_modified(&self, chunk: ChunkKey) {
        if let Some(data) = self.chunks.write().get_mut(&chunk) {
            data.mark_modified();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use steel_dynamic::ResetStatus;

    fn linked_pair() -> (Arc<RegionDirectory>, Arc<RegionBlocks>, Arc<RegionBlocks>) {
        let materials = Arc::new(MaterialRegistry::new(&SimConfig::default()));
        let directory = Arc::new(RegionDirectory::new());
        let make = |pos| {
            let blocks = Arc::new(RegionBlocks::new(
                pos,
                materials.clone(),
                Arc::new(UpdateInbox::new()),
                Arc::downgrade(&directory),
            ));
            directory.insert(blocks.clone());
            blocks
        };
        let west = make(RegionPos::new(0, 0, 0));
        let east = make(RegionPos::new(1, 0, 0));
        (directory, west, east)
    }

    #[test]
    fn test_chunk_states() {
        let (_directory, region, _) = linked_pair();
        let chunk = ChunkKey::new(1, 0, 0);
        assert_eq!(region.chunk_state(chunk), ChunkState::Unloaded);

        region.insert_chunk(chunk, SimChunk::unpopulated());
        assert_eq!(region.chunk_state(chunk), ChunkState::Unpopulated);

        let mut populated = SimChunk::unpopulated();
        populated.populate(0);
        region.insert_chunk(chunk, populated);
        assert_eq!(region.chunk_state(chunk), ChunkState::Populated);
    }

    #[test]
    fn test_only_growing_blocks_are_dynamic() {
        let (_directory, region, _) = linked_pair();
        let key = BlockKey::new(2, 1, 2);
        region.insert_chunk(key.chunk_key(), SimChunk::unpopulated());

        assert!(region.dynamic_material(key).is_none());
        region.set_block(key, Block::Crop { age: 0 });
        assert!(region.dynamic_material(key).is_some());
        region.set_block(key, Block::Stone);
        assert!(region.dynamic_material(key).is_none());
    }

    #[test]
    fn test_place_requests_reset() {
        let (_directory, region, _) = linked_pair();
        let key = BlockKey::new(2, 1, 2);
        assert!(!region.place_block(key, Block::Planks));

        region.insert_chunk(key.chunk_key(), SimChunk::unpopulated());
        assert!(region.place_block(key, Block::Planks));
        assert_eq!(region.inbox.reset_status(key), ResetStatus::PointPending);
    }

    #[test]
    fn test_place_across_region_border() {
        let (_directory, west, east) = linked_pair();
        let target = BlockPos::new(256, 1, 8);
        east.insert_chunk(target.key().chunk_key(), SimChunk::unpopulated());

        assert!(west.place_block_at(target, Block::Fire { age: 0 }));
        assert_eq!(east.block(target.key()), Some(Block::Fire { age: 0 }));
        assert_eq!(west.block_at(target), Some(Block::Fire { age: 0 }));
        assert_eq!(east.inbox.pending_resets(), 1);
        assert_eq!(west.inbox.pending_resets(), 0);

        // No region exists beyond the pair
        assert!(!west.place_block_at(BlockPos::new(600, 1, 8), Block::Planks));
    }
}
