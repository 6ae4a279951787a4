// Wrapper types making it harder to accidentaly use the wrong underlying type.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::math::Vector3;

/// Number of bits addressing a block inside a chunk along one axis.
pub const CHUNK_BITS: u32 = 4;
/// Blocks per chunk along one axis.
pub const CHUNK_SIZE: i32 = 1 << CHUNK_BITS;
/// Mask selecting the block coordinate inside a chunk.
pub const CHUNK_MASK: i32 = CHUNK_SIZE - 1;
/// Blocks in one cubic chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Number of bits addressing a chunk inside a region along one axis.
pub const REGION_CHUNK_BITS: u32 = 4;
/// Number of bits addressing a block inside a region along one axis.
pub const REGION_BLOCK_BITS: u32 = CHUNK_BITS + REGION_CHUNK_BITS;
/// Blocks per region along one axis.
pub const REGION_SIZE: i32 = 1 << REGION_BLOCK_BITS;
/// Mask selecting the block coordinate inside a region.
pub const REGION_MASK: i32 = REGION_SIZE - 1;
/// Mask selecting the chunk coordinate inside a region.
pub const REGION_CHUNK_MASK: i32 = (1 << REGION_CHUNK_BITS) - 1;

// A world block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockPos(pub Vector3<i32>);

impl BlockPos {
    /// Creates a block position from world coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// Returns this position moved by the given offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.0.x + dx, self.0.y + dy, self.0.z + dz)
    }

    /// The region containing this block.
    #[must_use]
    pub const fn region_pos(self) -> RegionPos {
        RegionPos::new(
            self.0.x >> REGION_BLOCK_BITS,
            self.0.y >> REGION_BLOCK_BITS,
            self.0.z >> REGION_BLOCK_BITS,
        )
    }

    /// The chunk containing this block.
    #[must_use]
    pub const fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(
            self.0.x >> CHUNK_BITS,
            self.0.y >> CHUNK_BITS,
            self.0.z >> CHUNK_BITS,
        )
    }

    /// The packed coordinate of this block inside its region.
    #[must_use]
    pub const fn key(self) -> BlockKey {
        BlockKey::new(self.0.x, self.0.y, self.0.z)
    }
}

impl Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0.x, self.0.y, self.0.z)
    }
}

// A world chunk position. Chunks are cubic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkPos(pub Vector3<i32>);

impl ChunkPos {
    /// Creates a chunk position from chunk coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// The region containing this chunk.
    #[must_use]
    pub const fn region_pos(self) -> RegionPos {
        RegionPos::new(
            self.0.x >> REGION_CHUNK_BITS,
            self.0.y >> REGION_CHUNK_BITS,
            self.0.z >> REGION_CHUNK_BITS,
        )
    }

    /// The packed coordinate of this chunk inside its region.
    #[must_use]
    pub const fn key(self) -> ChunkKey {
        ChunkKey::new(self.0.x, self.0.y, self.0.z)
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c({}, {}, {})", self.0.x, self.0.y, self.0.z)
    }
}

// A region position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegionPos(pub Vector3<i32>);

impl RegionPos {
    /// Creates a region position from region coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// World position of the region's minimum corner.
    #[must_use]
    pub const fn block_origin(self) -> BlockPos {
        BlockPos::new(
            self.0.x << REGION_BLOCK_BITS,
            self.0.y << REGION_BLOCK_BITS,
            self.0.z << REGION_BLOCK_BITS,
        )
    }

    /// World position of a region-local block.
    #[must_use]
    pub const fn block_pos(self, key: BlockKey) -> BlockPos {
        self.block_origin().offset(key.x(), key.y(), key.z())
    }

    /// World position of a region-local chunk.
    #[must_use]
    pub const fn chunk_pos(self, key: ChunkKey) -> ChunkPos {
        ChunkPos::new(
            (self.0.x << REGION_CHUNK_BITS) + key.x(),
            (self.0.y << REGION_CHUNK_BITS) + key.y(),
            (self.0.z << REGION_CHUNK_BITS) + key.z(),
        )
    }
}

impl Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r({}, {}, {})", self.0.x, self.0.y, self.0.z)
    }
}

/// A block coordinate inside a region, packed as `x | y << 8 | z << 16`.
///
/// Any world coordinate can be turned into a key; the bits above the region
/// size are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockKey(u32);

impl BlockKey {
    /// Packs the region-local part of the given coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        let x = (x & REGION_MASK) as u32;
        let y = (y & REGION_MASK) as u32;
        let z = (z & REGION_MASK) as u32;
        Self(x | (y << REGION_BLOCK_BITS) | (z << (2 * REGION_BLOCK_BITS)))
    }

    /// Rebuilds a key from its packed form.
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self {
        Self(packed & ((1 << (3 * REGION_BLOCK_BITS)) - 1))
    }

    /// The packed form of this key.
    #[must_use]
    pub const fn packed(self) -> u32 {
        self.0
    }

    /// Region-local x.
    #[must_use]
    pub const fn x(self) -> i32 {
        (self.0 & REGION_MASK as u32) as i32
    }

    /// Region-local y.
    #[must_use]
    pub const fn y(self) -> i32 {
        ((self.0 >> REGION_BLOCK_BITS) & REGION_MASK as u32) as i32
    }

    /// Region-local z.
    #[must_use]
    pub const fn z(self) -> i32 {
        ((self.0 >> (2 * REGION_BLOCK_BITS)) & REGION_MASK as u32) as i32
    }

    /// The chunk containing this block.
    #[must_use]
    pub const fn chunk_key(self) -> ChunkKey {
        ChunkKey::new(
            self.x() >> CHUNK_BITS,
            self.y() >> CHUNK_BITS,
            self.z() >> CHUNK_BITS,
        )
    }

    /// Index of this block inside its chunk's block array.
    #[must_use]
    pub const fn chunk_index(self) -> usize {
        let x = (self.x() & CHUNK_MASK) as usize;
        let y = (self.y() & CHUNK_MASK) as usize;
        let z = (self.z() & CHUNK_MASK) as usize;
        (y << (2 * CHUNK_BITS)) | (z << CHUNK_BITS) | x
    }

    /// The neighbouring key, or `None` when it lies outside the region.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        let (Some(x), Some(y), Some(z)) = (
            self.x().checked_add(dx),
            self.y().checked_add(dy),
            self.z().checked_add(dz),
        ) else {
            return None;
        };
        if x < 0 || y < 0 || z < 0 || x > REGION_MASK || y > REGION_MASK || z > REGION_MASK {
            return None;
        }
        Some(Self::new(x, y, z))
    }
}

impl Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x(), self.y(), self.z())
    }
}

/// A chunk coordinate inside a region, packed as `x | y << 4 | z << 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChunkKey(u16);

impl ChunkKey {
    /// Packs the region-local part of the given chunk coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        let x = (x & REGION_CHUNK_MASK) as u16;
        let y = (y & REGION_CHUNK_MASK) as u16;
        let z = (z & REGION_CHUNK_MASK) as u16;
        Self(x | (y << REGION_CHUNK_BITS) | (z << (2 * REGION_CHUNK_BITS)))
    }

    /// The packed form of this key.
    #[must_use]
    pub const fn packed(self) -> u16 {
        self.0
    }

    /// Region-local chunk x.
    #[must_use]
    pub const fn x(self) -> i32 {
        (self.0 & REGION_CHUNK_MASK as u16) as i32
    }

    /// Region-local chunk y.
    #[must_use]
    pub const fn y(self) -> i32 {
        ((self.0 >> REGION_CHUNK_BITS) & REGION_CHUNK_MASK as u16) as i32
    }

    /// Region-local chunk z.
    #[must_use]
    pub const fn z(self) -> i32 {
        ((self.0 >> (2 * REGION_CHUNK_BITS)) & REGION_CHUNK_MASK as u16) as i32
    }

    /// The minimum block of this chunk.
    #[must_use]
    pub const fn base(self) -> BlockKey {
        BlockKey::new(
            self.x() << CHUNK_BITS,
            self.y() << CHUNK_BITS,
            self.z() << CHUNK_BITS,
        )
    }

    /// Iterates every block of this chunk.
    pub fn blocks(self) -> impl Iterator<Item = BlockKey> {
        let base = self.base();
        (0..CHUNK_SIZE).flat_map(move |x| {
            (0..CHUNK_SIZE).flat_map(move |y| {
                (0..CHUNK_SIZE)
                    .map(move |z| BlockKey::new(base.x() + x, base.y() + y, base.z() + z))
            })
        })
    }
}

impl Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c({}, {}, {})", self.x(), self.y(), self.z())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_key_packing() {
        let key = BlockKey::new(1, 2, 3);
        assert_eq!((key.x(), key.y(), key.z()), (1, 2, 3));
        assert_eq!(key.packed(), 1 | (2 << 8) | (3 << 16));

        // World coordinates wrap into the region
        let wrapped = BlockKey::new(257, -1, 512 + 7);
        assert_eq!((wrapped.x(), wrapped.y(), wrapped.z()), (1, 255, 7));
    }

    #[test]
    fn test_chunk_key_of_block() {
        let key = BlockKey::new(17, 255, 0);
        let chunk = key.chunk_key();
        assert_eq!((chunk.x(), chunk.y(), chunk.z()), (1, 15, 0));
        assert_eq!(chunk.base(), BlockKey::new(16, 240, 0));
    }

    #[test]
    fn test_chunk_blocks() {
        let chunk = ChunkKey::new(2, 0, 1);
        let blocks: Vec<BlockKey> = chunk.blocks().collect();
        assert_eq!(blocks.len(), CHUNK_VOLUME);
        assert!(blocks.iter().all(|b| b.chunk_key() == chunk));
        assert_eq!(blocks[0], chunk.base());
    }

    #[test]
    fn test_offset_stays_in_region() {
        let edge = BlockKey::new(255, 0, 10);
        assert_eq!(edge.offset(1, 0, 0), None);
        assert_eq!(edge.offset(0, -1, 0), None);
        assert_eq!(edge.offset(-1, 1, 0), Some(BlockKey::new(254, 1, 10)));

        // Huge offsets leave the region instead of overflowing
        assert_eq!(edge.offset(i32::MAX, 0, 0), None);
        assert_eq!(edge.offset(0, 0, i32::MIN), None);
    }

    #[test]
    fn test_world_positions() {
        let pos = BlockPos::new(-1, 300, 513);
        let region = pos.region_pos();
        assert_eq!(region, RegionPos::new(-1, 1, 2));
        assert_eq!(region.block_pos(pos.key()), pos);
        assert_eq!(pos.chunk_pos().region_pos(), region);
        assert_eq!(pos.chunk_pos().key(), pos.key().chunk_key());
    }
}
