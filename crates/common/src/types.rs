use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a live entity in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier assigned to a placement when level data is loaded.
///
/// Each placement id materializes into at most one live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Identifier of a group of placements that activate together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Transform with a rotation about the vertical axis and a uniform scale.
    pub fn from_yaw(position: Vec3, yaw: f32, scale: f32) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_y(yaw),
            scale: Vec3::splat(scale),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Level of detail warranted by an object's distance from the observer.
///
/// `Detail(0)` is full detail; each higher level is cheaper. `Culled` sorts
/// after every detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Detail(u8),
    Culled,
}

impl Default for Tier {
    fn default() -> Self {
        Self::FULL
    }
}

impl Tier {
    pub const FULL: Tier = Tier::Detail(0);

    pub fn is_culled(self) -> bool {
        matches!(self, Tier::Culled)
    }

    /// Detail level, or `None` when culled.
    pub fn level(self) -> Option<u8> {
        match self {
            Tier::Detail(level) => Some(level),
            Tier::Culled => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Detail(level) => write!(f, "tier {level}"),
            Tier::Culled => f.write_str("culled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn transform_from_yaw_scales_uniformly() {
        let t = Transform::from_yaw(Vec3::new(1.0, 0.0, 2.0), 0.0, 1.5);
        assert_eq!(t.position, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::splat(1.5));
    }

    #[test]
    fn culled_orders_after_every_detail_level() {
        assert!(Tier::Detail(0) < Tier::Detail(1));
        assert!(Tier::Detail(u8::MAX) < Tier::Culled);
        assert!(Tier::Culled.is_culled());
        assert_eq!(Tier::Detail(3).level(), Some(3));
        assert_eq!(Tier::Culled.level(), None);
    }

    #[test]
    fn tier_display() {
        assert_eq!(Tier::Detail(2).to_string(), "tier 2");
        assert_eq!(Tier::Culled.to_string(), "culled");
        assert_eq!(PlacementId(7).to_string(), "p7");
    }
}
