//! Shared types for the proxim runtime.
//!
//! # Invariants
//! - Ids are plain values; nothing here owns world state.
//! - `Tier` orders every detail level before `Culled`.

mod placement;
mod types;

pub use placement::{EntityPlacement, PlacementGroup, PlacementKind, PlacementMeta};
pub use types::{EntityId, GroupId, PlacementId, Tier, Transform};

/// Capability consumed by the LOD scheduler.
///
/// Any entity type implementing these four methods can be registered; there is
/// no shared base type. `set_tier` is the tier-change notification: the object
/// alone decides what a tier means for its meshes, animation or AI.
pub trait ManagedObject {
    /// Current world position.
    fn position(&self) -> glam::Vec3;

    /// Tier recorded at the last notification.
    fn tier(&self) -> Tier;

    /// Called synchronously when a pass assigns a different tier.
    fn set_tier(&mut self, tier: Tier);

    /// `false` once the object has been destroyed or disabled.
    fn is_valid(&self) -> bool;
}

pub fn crate_info() -> &'static str {
    "proxim-common v0.1.0"
}
