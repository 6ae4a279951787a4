//! # Steel Utils
//!
//! Shared geometry for the dynamic update workspace: world positions, the
//! region-local packed keys the scheduler indexes by, and the chunk/region
//! size constants.

pub mod math;
pub mod types;

pub use types::{BlockKey, BlockPos, ChunkKey, ChunkPos, RegionPos};
