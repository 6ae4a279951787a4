//! The demo scene the binary runs.

use steel_utils::types::{CHUNK_BITS, REGION_SIZE};
use steel_utils::{BlockPos, ChunkPos};

use crate::chunk::Block;
use crate::error::SimError;
use crate::world::SimWorld;

/// A field of crops near the origin and a row of planks set on fire that
/// burns east, across the border into the next region when there is one.
pub fn plant_demo(world: &mut SimWorld) -> Result<(), SimError> {
    let world_edge = world.config().regions as i32 * REGION_SIZE;
    let fire_start = REGION_SIZE - 24;
    let fire_end = (REGION_SIZE + 24).min(world_edge - 1);

    for cx in 0..=1 {
        world.load_chunk(ChunkPos::new(cx, 0, 0))?;
    }
    for cx in (fire_start >> CHUNK_BITS)..=(fire_end >> CHUNK_BITS) {
        world.load_chunk(ChunkPos::new(cx, 0, 0))?;
    }

    let mut crops = 0;
    for x in 4..12 {
        for z in 4..12 {
            world.place_block(BlockPos::new(x, 1, z), Block::Crop { age: 0 })?;
            crops += 1;
        }
    }

    for x in fire_start + 1..=fire_end {
        world.place_block(BlockPos::new(x, 1, 8), Block::Planks)?;
    }
    world.place_block(BlockPos::new(fire_start, 1, 8), Block::Fire { age: 0 })?;

    log::info!(
        "Planted {crops} crops and {} planks from x = {fire_start}",
        fire_end - fire_start
    );
    Ok(())
}
