//! The simulated world and its tick driver.

use std::sync::Arc;
use std::thread;

use rayon::prelude::*;
use steel_dynamic::{
    DynamicUpdateTree, END_OF_THE_WORLD, StageToken, TickStage, UpdateError, UpdateRecord,
};
use steel_utils::{BlockPos, ChunkPos, RegionPos};

use crate::chunk::{Block, SimChunk};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::materials::MaterialRegistry;
use crate::region::{RegionBlocks, RegionDirectory};
use crate::store::{RamUpdateStore, SavedChunk};

/// One region: its blocks and its update tree.
pub struct SimRegion {
    pos: RegionPos,
    blocks: Arc<RegionBlocks>,
    tree: DynamicUpdateTree,
}

impl SimRegion {
    /// Position of the region.
    #[must_use]
    pub fn pos(&self) -> RegionPos {
        self.pos
    }

    /// The region's blocks.
    #[must_use]
    pub fn blocks(&self) -> &Arc<RegionBlocks> {
        &self.blocks
    }

    /// The region's update tree.
    #[must_use]
    pub fn tree(&self) -> &DynamicUpdateTree {
        &self.tree
    }

    /// Local phase of one pass, run on whichever thread picked up the region.
    fn run_local(&mut self, age: u64, threshold: u64) -> Result<Vec<UpdateRecord>, UpdateError> {
        self.tree.set_region_thread(thread::current().id());
        let token = StageToken::enter(TickStage::DYNAMIC_BLOCKS, age);
        self.tree.commit_pending(&token, &*self.blocks, age)?;
        self.tree.drain_due(&token, &*self.blocks, age, threshold)
    }

    /// Global phase of one pass: updates that may touch neighbouring regions.
    fn run_global(&mut self, age: u64, deferred: Vec<UpdateRecord>) -> Result<(), UpdateError> {
        let token = StageToken::enter(TickStage::GLOBAL_DYNAMIC_BLOCKS, age);
        for record in deferred {
            self.tree.execute(&token, &*self.blocks, age, record, true)?;
        }
        Ok(())
    }

    fn first_update_time(&self, stage: TickStage, age: u64) -> u64 {
        let token = StageToken::enter(stage, age);
        self.tree.first_update_time(&token)
    }

    fn take_last_updates(&mut self) -> usize {
        let updates = self.tree.last_updates();
        self.tree.reset_last_updates();
        updates
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// World age of the tick.
    pub age: u64,
    /// Passes run.
    pub passes: usize,
    /// Updates executed, in both phases.
    pub executed: usize,
    /// Updates handed from the local to the global phase.
    pub deferred: usize,
}

/// A grid of regions advanced one tick at a time.
pub struct SimWorld {
    config: SimConfig,
    directory: Arc<RegionDirectory>,
    regions: Vec<SimRegion>,
    store: RamUpdateStore,
    age: u64,
}

impl SimWorld {
    /// Creates a `regions` x `regions` grid of empty regions at `y == 0`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let materials = Arc::new(MaterialRegistry::new(&config));
        let directory = Arc::new(RegionDirectory::new());
        let edge = config.regions as i32;

        let mut regions = Vec::with_capacity((edge * edge) as usize);
        for x in 0..edge {
            for z in 0..edge {
                let pos = RegionPos::new(x, 0, z);
                let tree = DynamicUpdateTree::new();
                let blocks = Arc::new(RegionBlocks::new(
                    pos,
                    materials.clone(),
                    tree.inbox().clone(),
                    Arc::downgrade(&directory),
                ));
                directory.insert(blocks.clone());
                regions.push(SimRegion { pos, blocks, tree });
            }
        }
        log::info!("Created world with {} regions", regions.len());

        Self {
            config,
            directory,
            regions,
            store: RamUpdateStore::new(),
            age: 0,
        }
    }

    /// Current world age.
    #[must_use]
    pub fn age(&self) -> u64 {
        self.age
    }

    /// The driver settings.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Every region.
    #[must_use]
    pub fn regions(&self) -> &[SimRegion] {
        &self.regions
    }

    /// The region at `pos`.
    #[must_use]
    pub fn region(&self, pos: RegionPos) -> Option<&SimRegion> {
        self.regions.iter().find(|region| region.pos == pos)
    }

    /// Storage of unloaded chunks.
    #[must_use]
    pub fn store(&self) -> &RamUpdateStore {
        &self.store
    }

    /// Updates queued across every region, not counting inboxes.
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.regions.iter().map(|region| region.tree.len()).sum()
    }

    /// The block at a world position, if its chunk is loaded.
    #[must_use]
    pub fn block(&self, pos: BlockPos) -> Option<Block> {
        self.directory.get(pos.region_pos())?.block(pos.key())
    }

    /// Places a block. Dynamic blocks get their first update at the next tick.
    pub fn place_block(&self, pos: BlockPos, block: Block) -> Result<(), SimError> {
        let region = self
            .directory
            .get(pos.region_pos())
            .ok_or(SimError::UnknownRegion(pos.region_pos()))?;
        if region.place_block(pos.key(), block) {
            Ok(())
        } else {
            Err(SimError::ChunkNotLoaded(pos.chunk_pos()))
        }
    }

    /// Loads a chunk from the store, or generates it.
    ///
    /// Updates saved with the chunk are handed to the region's inbox. Returns
    /// false if the chunk was already loaded.
    pub fn load_chunk(&mut self, pos: ChunkPos) -> Result<bool, SimError> {
        let region_pos = pos.region_pos();
        let region = self
            .regions
            .iter_mut()
            .find(|region| region.pos == region_pos)
            .ok_or(SimError::UnknownRegion(region_pos))?;

        let key = pos.key();
        if region.blocks.is_loaded(key) {
            return Ok(false);
        }

        match self.store.take(pos) {
            Some(saved) => {
                region
                    .blocks
                    .insert_chunk(key, SimChunk::from_saved(saved.blocks));
                log::debug!(
                    "Loaded chunk {pos} with {} saved updates",
                    saved.updates.len()
                );
                region.tree.inbox().add_persisted_updates(saved.updates);
            }
            None => {
                let mut chunk = SimChunk::unpopulated();
                chunk.populate(pos.0.y);
                region.blocks.insert_chunk(key, chunk);
            }
        }
        Ok(true)
    }

    /// Unloads a chunk, saving its blocks and pending updates to the store.
    ///
    /// Returns false if the chunk was not loaded.
    pub fn unload_chunk(&mut self, pos: ChunkPos) -> Result<bool, SimError> {
        let region_pos = pos.region_pos();
        let region = self
            .regions
            .iter_mut()
            .find(|region| region.pos == region_pos)
            .ok_or(SimError::UnknownRegion(region_pos))?;

        let key = pos.key();
        if !region.blocks.is_loaded(key) {
            return Ok(false);
        }

        region.tree.set_region_thread(thread::current().id());
        let token = StageToken::enter(TickStage::SNAPSHOT, self.age);
        let updates = region.tree.updates_in_chunk(&token, key);
        region.tree.remove_chunk_updates(&token, key);

        let Some(chunk) = region.blocks.remove_chunk(key) else {
            return Ok(false);
        };
        self.store.save(
            pos,
            SavedChunk {
                blocks: chunk.into_blocks(),
                updates,
            },
        );
        Ok(true)
    }

    /// Advances the world by one tick and runs every dynamic update now due.
    ///
    /// Each pass commits and drains every region in parallel, then executes
    /// the updates they deferred one region at a time. Passes repeat while
    /// they execute anything, until `update_threshold` updates have run.
    pub fn tick(&mut self) -> Result<TickReport, SimError> {
        self.age += 1;
        let age = self.age;
        let _tick = tracing::debug_span!("tick", age).entered();

        let mut report = TickReport {
            age,
            ..TickReport::default()
        };
        let mut earliest = self.first_update_time(TickStage::TICKSTART);
        while report.executed < self.config.update_threshold {
            let threshold = earliest
                .saturating_add(self.config.pulse_every - 1)
                .min(age);
            let _pass = tracing::trace_span!("dynamic_pass", pass = report.passes, threshold).entered();

            let deferred = self
                .regions
                .par_iter_mut()
                .map(|region| region.run_local(age, threshold))
                .collect::<Result<Vec<_>, _>>()?;
            report.deferred += deferred.iter().map(Vec::len).sum::<usize>();

            for (region, records) in self.regions.iter_mut().zip(deferred) {
                region.run_global(age, records)?;
            }

            let executed: usize = self.regions.iter_mut().map(SimRegion::take_last_updates).sum();
            report.passes += 1;
            report.executed += executed;
            if executed == 0 {
                break;
            }
            // Still inside the global phase of the pass just run
            earliest = self.first_update_time(TickStage::GLOBAL_DYNAMIC_BLOCKS);
        }

        if report.executed >= self.config.update_threshold {
            log::warn!(
                "Tick {age} hit the update threshold after {} updates",
                report.executed
            );
        }
        Ok(report)
    }

    fn first_update_time(&self, stage: TickStage) -> u64 {
        self.regions
            .iter()
            .map(|region| region.first_update_time(stage, self.age))
            .min()
            .unwrap_or(END_OF_THE_WORLD)
    }
}
