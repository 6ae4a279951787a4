//! Materials that take dynamic updates.
//!
//! Crops grow in place. Fire burns through flammable neighbours and burns out;
//! since it reaches one block around itself, fire on a region border runs in
//! the global phase.

use std::sync::Arc;

use steel_dynamic::{DynamicBlock, DynamicMaterial, EffectRange, HookError};

use crate::chunk::{Block, CROP_MAX_AGE, FIRE_MAX_AGE};
use crate::config::SimConfig;
use crate::region::RegionBlocks;

const NEIGHBOURS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Maps blocks to their dynamic material.
pub struct MaterialRegistry {
    crop: Arc<dyn DynamicMaterial<RegionBlocks>>,
    fire: Arc<dyn DynamicMaterial<RegionBlocks>>,
}

impl MaterialRegistry {
    /// Builds the registry with delays from `config`.
    #[must_use]
    pub fn new(config: &SimConfig) -> Self {
        Self {
            crop: Arc::new(CropMaterial {
                growth_delay: config.crop_growth_delay,
            }),
            fire: Arc::new(FireMaterial {
                burn_delay: config.fire_burn_delay,
            }),
        }
    }

    /// The material of `block` if it takes dynamic updates.
    #[must_use]
    pub fn material_for(&self, block: Block) -> Option<Arc<dyn DynamicMaterial<RegionBlocks>>> {
        match block {
            Block::Crop { .. } => Some(self.crop.clone()),
            Block::Fire { .. } => Some(self.fire.clone()),
            Block::Air | Block::Stone | Block::Planks => None,
        }
    }
}

/// Grows one stage every `growth_delay` ticks until fully grown.
pub struct CropMaterial {
    growth_delay: u64,
}

impl DynamicMaterial<RegionBlocks> for CropMaterial {
    fn dynamic_range(&self) -> EffectRange {
        EffectRange::None
    }

    fn on_first_update(
        &self,
        block: &mut DynamicBlock<'_, RegionBlocks>,
        current_time: u64,
    ) -> Result<(), HookError> {
        if let Some(Block::Crop { age }) = block.region().block(block.pos())
            && age < CROP_MAX_AGE
        {
            block.queue_update(current_time + self.growth_delay, 0, false)?;
        }
        Ok(())
    }

    fn on_dynamic_update(
        &self,
        block: &mut DynamicBlock<'_, RegionBlocks>,
        update_time: u64,
        _data: i32,
    ) -> Result<(), HookError> {
        let Some(Block::Crop { age }) = block.region().block(block.pos()) else {
            return Ok(());
        };
        if age >= CROP_MAX_AGE {
            return Ok(());
        }

        let age = age + 1;
        block.region().set_block(block.pos(), Block::Crop { age });
        if age < CROP_MAX_AGE {
            block.queue_update(update_time + self.growth_delay, 0, false)?;
        }
        Ok(())
    }
}

/// Spreads into flammable neighbours every `burn_delay` ticks, then burns out.
pub struct FireMaterial {
    burn_delay: u64,
}

impl DynamicMaterial<RegionBlocks> for FireMaterial {
    fn dynamic_range(&self) -> EffectRange {
        EffectRange::Cube(1)
    }

    fn on_first_update(
        &self,
        block: &mut DynamicBlock<'_, RegionBlocks>,
        current_time: u64,
    ) -> Result<(), HookError> {
        block.queue_update(current_time + self.burn_delay, 0, false)?;
        Ok(())
    }

    fn on_dynamic_update(
        &self,
        block: &mut DynamicBlock<'_, RegionBlocks>,
        update_time: u64,
        _data: i32,
    ) -> Result<(), HookError> {
        let region = block.region();
        let Some(Block::Fire { age }) = region.block(block.pos()) else {
            return Ok(());
        };

        let origin = region.world_pos(block.pos());
        for (dx, dy, dz) in NEIGHBOURS {
            let target = origin.offset(dx, dy, dz);
            if region.block_at(target).is_some_and(Block::is_flammable) {
                region.place_block_at(target, Block::Fire { age: 0 });
            }
        }

        let age = age + 1;
        if age >= FIRE_MAX_AGE {
            region.set_block(block.pos(), Block::Air);
            log::trace!("Fire at {origin} burnt out");
        } else {
            region.set_block(block.pos(), Block::Fire { age });
            block.queue_update(update_time + self.burn_delay, 0, false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = MaterialRegistry::new(&SimConfig::default());
        assert!(registry.material_for(Block::Crop { age: 3 }).is_some());
        assert!(registry.material_for(Block::Fire { age: 0 }).is_some());
        assert!(registry.material_for(Block::Planks).is_none());
        assert!(registry.material_for(Block::Air).is_none());
    }

    #[test]
    fn test_ranges() {
        let registry = MaterialRegistry::new(&SimConfig::default());
        let fire = registry
            .material_for(Block::Fire { age: 0 })
            .expect("fire is dynamic");
        let crop = registry
            .material_for(Block::Crop { age: 0 })
            .expect("crops are dynamic");
        assert_eq!(fire.dynamic_range(), EffectRange::Cube(1));
        assert_eq!(crop.dynamic_range(), EffectRange::None);
        assert!(fire.type_name().ends_with("FireMaterial"));
    }
}
