//! World Kernel: the live entities materialized from placements.
//!
//! # Invariants
//! - All state mutations flow through explicit operations and are logged.
//! - A despawned entity is invalidated even if other owners still hold it.

pub mod world;

pub use world::{LiveEntity, SharedEntity, World, WorldEvent};

pub fn crate_info() -> &'static str {
    "proxim-kernel v0.1.0"
}
