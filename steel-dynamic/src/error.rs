//! Error types for the dynamic update scheduler.
//!
//! Two kinds of failure exist. [`UpdateError`] is returned to the tick driver
//! when a material hook fails. [`Violation`] describes a broken internal
//! contract (index drift, wrong stage, queue/map mismatch); those are never
//! recovered from and end in a panic through [`violated`].

use std::error::Error;

use steel_utils::{BlockKey, ChunkKey};

use crate::stage::TickStage;

/// Boxed error returned by material hooks.
pub type HookError = Box<dyn Error + Send + Sync + 'static>;

/// An error propagated out of the scheduler to the tick driver.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// A material hook returned an error.
    #[error("unable to execute dynamic update for {material} at {pos}")]
    Hook {
        /// Type name of the material whose hook failed.
        material: &'static str,
        /// The block the hook ran for.
        pos: BlockKey,
        /// The error returned by the hook.
        #[source]
        source: HookError,
    },
}

/// A broken scheduler invariant.
#[derive(Debug, thiserror::Error)]
pub enum Violation {
    /// A live record was not found in its coordinate chain.
    #[error("dynamic update at {0} missing from its block chain")]
    MissingFromChain(BlockKey),
    /// A record appeared twice in one coordinate chain.
    #[error("dynamic update at {0} appeared twice in its block chain")]
    DuplicateInChain(BlockKey),
    /// A live record was not found in the time-ordered set.
    #[error("dynamic update at {0} missing from the update queue")]
    MissingFromQueue(BlockKey),
    /// A live record was not found in its chunk set.
    #[error("dynamic update at {pos} missing from chunk {chunk}")]
    MissingFromChunk {
        /// The record's coordinate.
        pos: BlockKey,
        /// The chunk that should hold it.
        chunk: ChunkKey,
    },
    /// The chain points at a slot that holds no record.
    #[error("block chain at {0} points at a vacant slot")]
    DanglingHandle(BlockKey),
    /// The head of the update queue names a record that no longer exists.
    #[error("update queue entry due at {0} names a removed record")]
    StaleQueueEntry(u64),
    /// An update expected to be present could not be removed.
    #[error("expected dynamic update at {0} was not present")]
    ExpectedUpdateMissing(BlockKey),
    /// The three indexes disagree on how many records exist.
    #[error("index sizes disagree: {queue} queued, {chained} chained, {chunked} in chunks")]
    SizeMismatch {
        /// Entries in the time-ordered set.
        queue: usize,
        /// Records reachable from block chains.
        chained: usize,
        /// Records held by chunk sets.
        chunked: usize,
    },
    /// A reset coordinate was dequeued without a pending status.
    #[error("reset pending map and queue mismatch at {0}")]
    ResetMismatch(BlockKey),
    /// The operation is not permitted in this stage or on this thread.
    #[error("{operation} not permitted in stage {stage:?} on this thread")]
    Stage {
        /// The attempted operation.
        operation: &'static str,
        /// The stage the caller is in.
        stage: TickStage,
    },
}

/// Logs a violated invariant and aborts the current operation.
///
/// # Panics
/// Always.
#[cold]
#[track_caller]
pub fn violated(violation: Violation) -> ! {
    log::error!("Dynamic update invariant violated: {violation}");
    panic!("{violation}");
}
