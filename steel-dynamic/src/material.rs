//! Contracts between the update tree and the world around it.
//!
//! The tree does not own blocks or chunks. It reaches them through a
//! [`RegionAccess`] supplied by the caller, and calls back into materials
//! through [`DynamicMaterial`].

use std::any;
use std::sync::Arc;

use steel_utils::math::Vector3;
use steel_utils::{BlockKey, ChunkKey};

use crate::error::{HookError, UpdateError};
use crate::record::UpdateHandle;
use crate::stage::{StageToken, TickStage};
use crate::tree::DynamicUpdateTree;

/// Load state of a chunk, as seen without triggering any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not in memory.
    Unloaded,
    /// In memory but not yet populated by world generation.
    Unpopulated,
    /// Ready for simulation.
    Populated,
}

/// The blocks an update of a material may touch, relative to the updated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectRange {
    /// Only the block itself.
    #[default]
    None,
    /// Every block within `radius` along each axis.
    Cube(u8),
    /// An arbitrary box of offsets, both corners inclusive.
    Cuboid {
        /// The minimum offset.
        min: Vector3<i32>,
        /// The maximum offset.
        max: Vector3<i32>,
    },
}

impl EffectRange {
    /// The inclusive offset box of this range.
    #[must_use]
    pub fn bounds(self) -> (Vector3<i32>, Vector3<i32>) {
        match self {
            Self::None => (Vector3::default(), Vector3::default()),
            Self::Cube(radius) => {
                let r = i32::from(radius);
                (Vector3::new(-r, -r, -r), Vector3::new(r, r, r))
            }
            Self::Cuboid { min, max } => (min, max),
        }
    }

    /// Returns true if an update at `pos` cannot reach outside the region.
    #[must_use]
    pub fn is_region_local(self, pos: BlockKey) -> bool {
        let (min, max) = self.bounds();
        pos.offset(min.x, min.y, min.z).is_some() && pos.offset(max.x, max.y, max.z).is_some()
    }
}

/// Read access to the blocks of one region.
///
/// Implementations must never load or generate chunks from these calls.
pub trait RegionAccess: Sized {
    /// The load state of a chunk of this region.
    fn chunk_state(&self, chunk: ChunkKey) -> ChunkState;

    /// The material at `pos` if it takes dynamic updates.
    fn dynamic_material(&self, pos: BlockKey) -> Option<Arc<dyn DynamicMaterial<Self>>>;

    /// Flags a chunk as changed since it was last saved.
    fn mark_modified(&self, chunk: ChunkKey);
}

/// A block type that wants scheduled callbacks.
pub trait DynamicMaterial<R: RegionAccess>: Send + Sync {
    /// Name used when reporting hook failures.
    fn type_name(&self) -> &'static str {
        any::type_name::<Self>()
    }

    /// The blocks an update of this material may touch.
    fn dynamic_range(&self) -> EffectRange;

    /// Called once when the block is placed or its updates are reset.
    fn on_first_update(
        &self,
        block: &mut DynamicBlock<'_, R>,
        current_time: u64,
    ) -> Result<(), HookError>;

    /// Called when a scheduled update of this block is due.
    fn on_dynamic_update(
        &self,
        block: &mut DynamicBlock<'_, R>,
        update_time: u64,
        data: i32,
    ) -> Result<(), HookError>;
}

/// The block a hook is running for.
///
/// Hooks may schedule further updates through it; those go straight into the
/// tree that is executing the hook.
pub struct DynamicBlock<'a, R: RegionAccess> {
    pos: BlockKey,
    region: &'a R,
    tree: &'a mut DynamicUpdateTree,
    token: &'a StageToken,
}

impl<'a, R: RegionAccess> DynamicBlock<'a, R> {
    pub(crate) fn new(
        pos: BlockKey,
        region: &'a R,
        tree: &'a mut DynamicUpdateTree,
        token: &'a StageToken,
    ) -> Self {
        Self {
            pos,
            region,
            tree,
            token,
        }
    }

    /// The block's position in its region.
    #[must_use]
    pub fn pos(&self) -> BlockKey {
        self.pos
    }

    /// The region the block lives in.
    #[must_use]
    pub fn region(&self) -> &'a R {
        self.region
    }

    /// World age of the running stage.
    #[must_use]
    pub fn world_age(&self) -> u64 {
        self.token.world_age()
    }

    /// The running stage.
    #[must_use]
    pub fn stage(&self) -> TickStage {
        self.token.stage()
    }

    /// Schedules an update of this block.
    pub fn queue_update(
        &mut self,
        update_time: u64,
        data: i32,
        exclusive: bool,
    ) -> Result<UpdateHandle, UpdateError> {
        self.queue_update_at(self.pos, update_time, data, exclusive)
    }

    /// Schedules an update of another block of the same region.
    pub fn queue_update_at(
        &mut self,
        pos: BlockKey,
        update_time: u64,
        data: i32,
        exclusive: bool,
    ) -> Result<UpdateHandle, UpdateError> {
        self.tree
            .queue_update(self.token, self.region, pos, update_time, data, exclusive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_range_is_always_local() {
        assert!(EffectRange::None.is_region_local(BlockKey::new(0, 0, 0)));
        assert!(EffectRange::None.is_region_local(BlockKey::new(255, 255, 255)));
    }

    #[test]
    fn test_cube_range_at_region_edge() {
        let range = EffectRange::Cube(1);
        assert!(range.is_region_local(BlockKey::new(1, 1, 1)));
        assert!(range.is_region_local(BlockKey::new(254, 254, 254)));
        assert!(!range.is_region_local(BlockKey::new(0, 10, 10)));
        assert!(!range.is_region_local(BlockKey::new(10, 255, 10)));
    }

    #[test]
    fn test_cuboid_range() {
        let range = EffectRange::Cuboid {
            min: Vector3::new(0, -1, 0),
            max: Vector3::new(0, 0, 0),
        };
        assert!(range.is_region_local(BlockKey::new(0, 1, 0)));
        assert!(!range.is_region_local(BlockKey::new(0, 0, 0)));

        let unbounded = EffectRange::Cuboid {
            min: Vector3::new(0, 0, 0),
            max: Vector3::new(i32::MAX, 0, 0),
        };
        assert!(!unbounded.is_region_local(BlockKey::new(5, 0, 0)));
    }
}
