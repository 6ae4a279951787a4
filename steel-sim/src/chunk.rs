//! Blocks and the cubic chunks holding them.

use std::mem;

use steel_utils::BlockKey;
use steel_utils::types::{CHUNK_SIZE, CHUNK_VOLUME};

/// Highest crop growth stage.
pub const CROP_MAX_AGE: u8 = 7;
/// Fire burns out after this many stages.
pub const FIRE_MAX_AGE: u8 = 4;

/// A block of the simulated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Block {
    /// Empty space.
    #[default]
    Air,
    /// Inert ground.
    Stone,
    /// Flammable.
    Planks,
    /// A growing crop.
    Crop {
        /// Growth stage, `0..=CROP_MAX_AGE`.
        age: u8,
    },
    /// Burning fire.
    Fire {
        /// Burn stage, `0..FIRE_MAX_AGE`.
        age: u8,
    },
}

impl Block {
    /// Returns true if fire spreads into this block.
    #[must_use]
    pub const fn is_flammable(self) -> bool {
        matches!(self, Self::Planks | Self::Crop { .. })
    }
}

/// One 16x16x16 chunk.
#[derive(Debug, Clone)]
pub struct SimChunk {
    blocks: Box<[Block]>,
    populated: bool,
    modified: bool,
}

impl SimChunk {
    /// A chunk of air that world generation has not touched yet.
    #[must_use]
    pub fn unpopulated() -> Self {
        Self {
            blocks: vec![Block::Air; CHUNK_VOLUME].into_boxed_slice(),
            populated: false,
            modified: false,
        }
    }

    /// A chunk rebuilt from saved blocks.
    #[must_use]
    pub fn from_saved(blocks: Box<[Block]>) -> Self {
        Self {
            blocks,
            populated: true,
            modified: false,
        }
    }

    /// Flat generation: a stone floor in the bottom layer of chunks at `y == 0`.
    pub fn populate(&mut self, chunk_y: i32) {
        if chunk_y == 0 {
            for x in 0..CHUNK_SIZE {
                for z in 0..CHUNK_SIZE {
                    self.blocks[BlockKey::new(x, 0, z).chunk_index()] = Block::Stone;
                }
            }
        }
        self.populated = true;
    }

    /// Whether generation has run.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Whether the chunk changed since it was loaded.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flags the chunk as changed.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// The block at `key`. Only the chunk-local bits of the key are used.
    #[must_use]
    pub fn block(&self, key: BlockKey) -> Block {
        self.blocks[key.chunk_index()]
    }

    /// Replaces the block at `key`, returning the old one.
    pub fn set_block(&mut self, key: BlockKey, block: Block) -> Block {
        self.modified = true;
        mem::replace(&mut self.blocks[key.chunk_index()], block)
    }

    /// Consumes the chunk, returning its blocks for saving.
    #[must_use]
    pub fn into_blocks(self) -> Box<[Block]> {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_lays_floor() {
        let mut chunk = SimChunk::unpopulated();
        assert!(!chunk.is_populated());
        chunk.populate(0);
        assert!(chunk.is_populated());
        assert_eq!(chunk.block(BlockKey::new(3, 0, 9)), Block::Stone);
        assert_eq!(chunk.block(BlockKey::new(3, 1, 9)), Block::Air);
        assert!(!chunk.is_modified());
    }

    #[test]
    fn test_set_block_marks_modified() {
        let mut chunk = SimChunk::unpopulated();
        let key = BlockKey::new(17, 2, 33);
        assert_eq!(chunk.set_block(key, Block::Planks), Block::Air);
        assert_eq!(chunk.block(key), Block::Planks);
        assert!(chunk.is_modified());
    }
}
