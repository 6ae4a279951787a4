//! # Steel Dynamic
//!
//! Deferred block updates. Blocks such as crops and fire ask for a callback at
//! a later world age instead of being processed right away; each region keeps
//! those requests in a [`DynamicUpdateTree`] and executes them as they come due.
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    missing_docs,
    clippy::unwrap_used
)]
#![allow(
    clippy::single_call_fn,
    clippy::multiple_inherent_impl,
    clippy::shadow_unrelated,
    clippy::missing_errors_doc,
    clippy::struct_excessive_bools,
    clippy::needless_pass_by_value,
    clippy::cargo_common_metadata
)]

pub mod error;
pub mod inbox;
pub mod index;
pub mod material;
pub mod outcome;
pub mod record;
pub mod stage;
pub mod tree;

#[cfg(test)]
mod test_support;

pub use error::{HookError, UpdateError, Violation};
pub use inbox::{ResetScope, ResetStatus, UpdateInbox};
pub use index::UpdateIndex;
pub use material::{ChunkState, DynamicBlock, DynamicMaterial, EffectRange, RegionAccess};
pub use outcome::UpdateResult;
pub use record::{UpdateHandle, UpdateRecord};
pub use stage::{StageToken, TickStage};
pub use tree::{DynamicUpdateTree, END_OF_THE_WORLD};
