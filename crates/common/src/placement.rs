use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, PlacementId, Transform};

/// Broad category of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    Enemy,
    Prop,
}

/// Placement metadata carried through to the live entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementMeta {
    pub level: u32,
    pub is_boss: bool,
    /// Yaw in radians.
    pub rotation_y: f32,
    pub scale: f32,
    /// Owning room/region, if any.
    pub region: Option<i32>,
}

impl Default for PlacementMeta {
    fn default() -> Self {
        Self {
            level: 1,
            is_boss: false,
            rotation_y: 0.0,
            scale: 1.0,
            region: None,
        }
    }
}

/// A static descriptor of what to instantiate and where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPlacement {
    pub id: PlacementId,
    pub kind: PlacementKind,
    /// Type tag understood by the materializer, e.g. `"skeleton"` or `"barrel"`.
    pub type_tag: String,
    pub position: Vec3,
    pub meta: PlacementMeta,
}

impl EntityPlacement {
    pub fn new(id: PlacementId, kind: PlacementKind, type_tag: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            kind,
            type_tag: type_tag.into(),
            position,
            meta: PlacementMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: PlacementMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Transform the live entity starts with.
    pub fn transform(&self) -> Transform {
        Transform::from_yaw(self.position, self.meta.rotation_y, self.meta.scale)
    }
}

/// A cluster of placements sharing one activation check.
///
/// Groups materialize as a unit: every member in the same tick, or none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementGroup {
    pub id: GroupId,
    /// Point tested against the activation radius.
    pub anchor: Vec3,
    pub members: Vec<EntityPlacement>,
}

impl PlacementGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PlacementId> + '_ {
        self.members.iter().map(|m| m.id)
    }
}
