use steel_dynamic::UpdateError;
use steel_utils::{ChunkPos, RegionPos};

use crate::config::ConfigError;

/// Errors raised by the simulation driver.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Loading the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A material hook failed while the world was ticking.
    #[error(transparent)]
    Update(#[from] UpdateError),
    /// The position lies outside every simulated region.
    #[error("region {0} is not part of the simulation")]
    UnknownRegion(RegionPos),
    /// The chunk holding a position is not loaded.
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkPos),
}
