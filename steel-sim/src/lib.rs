//! # Steel Sim
//!
//! Drives dynamic block updates over a grid of in-memory regions: loads and
//! unloads chunks, runs the per-region and global update phases each tick,
//! and ships a couple of demo materials.
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

pub mod chunk;
/// Driver settings loaded from JSON5.
pub mod config;
/// Driver errors.
pub mod error;
pub mod logger;
pub mod materials;
pub mod region;
pub mod scene;
pub mod store;
pub mod world;

pub use chunk::{Block, SimChunk};
pub use config::{CONFIG_PATH, ConfigError, LogConfig, SimConfig};
pub use error::SimError;
pub use world::{SimWorld, TickReport};
