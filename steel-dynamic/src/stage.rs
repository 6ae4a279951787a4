//! Tick stages and the tokens that prove which stage a caller is in.
//!
//! The scheduler does not look at ambient thread state. Every call that reads
//! or mutates the update tree carries a [`StageToken`] created by the tick
//! driver, and the tree checks it at the boundary.

use std::thread::{self, ThreadId};

use bitflags::bitflags;

bitflags! {
    /// Phases of one simulation tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TickStage: u32 {
        /// Start of the tick, before any region work.
        const TICKSTART = 1;
        /// Per-region dynamic block updates on the region thread.
        const DYNAMIC_BLOCKS = 1 << 1;
        /// Cross-region dynamic block updates.
        const GLOBAL_DYNAMIC_BLOCKS = 1 << 2;
        /// Per-region physics on the region thread.
        const PHYSICS = 1 << 3;
        /// Cross-region physics.
        const GLOBAL_PHYSICS = 1 << 4;
        /// Lighting.
        const LIGHTING = 1 << 5;
        /// Preparing the snapshot.
        const PRESNAPSHOT = 1 << 6;
        /// Read-only snapshot of the world state.
        const SNAPSHOT = 1 << 7;
        /// End of the tick.
        const FINALIZE = 1 << 8;
    }
}

impl TickStage {
    /// Stages in which only the region thread may touch its update tree.
    pub const LOCAL_UPDATES: Self = Self::DYNAMIC_BLOCKS.union(Self::PHYSICS);
    /// Stages in which any thread may touch any update tree.
    pub const GLOBAL_UPDATES: Self = Self::GLOBAL_DYNAMIC_BLOCKS.union(Self::GLOBAL_PHYSICS);
}

/// Proof of the current tick stage, handed to the update tree on every call.
///
/// A token remembers the thread that created it, so a token minted on one
/// thread does not pass a region-thread check on another.
#[derive(Debug, Clone)]
pub struct StageToken {
    stage: TickStage,
    thread: ThreadId,
    world_age: u64,
}

impl StageToken {
    /// Enters `stage` on the current thread at the given world age.
    #[must_use]
    pub fn enter(stage: TickStage, world_age: u64) -> Self {
        Self {
            stage,
            thread: thread::current().id(),
            world_age,
        }
    }

    /// The stage this token was minted for.
    #[must_use]
    pub const fn stage(&self) -> TickStage {
        self.stage
    }

    /// The thread that minted this token.
    #[must_use]
    pub const fn thread(&self) -> ThreadId {
        self.thread
    }

    /// World age at the time the stage was entered.
    #[must_use]
    pub const fn world_age(&self) -> u64 {
        self.world_age
    }

    /// Returns true when the token is in one of `any_thread` stages, or in one
    /// of `owner_only` stages and was minted on `owner`.
    #[must_use]
    pub fn permits(
        &self,
        any_thread: TickStage,
        owner_only: TickStage,
        owner: Option<ThreadId>,
    ) -> bool {
        if self.stage.intersects(any_thread) {
            return true;
        }
        self.stage.intersects(owner_only) && owner == Some(self.thread)
    }
}
