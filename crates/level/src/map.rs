use std::path::Path;

use glam::Vec3;
use proxim_common::{
    EntityPlacement, GroupId, PlacementGroup, PlacementId, PlacementKind, PlacementMeta,
};
use serde::{Deserialize, Serialize};

use crate::LevelError;

/// A point on the tile grid. Fractional values are allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: f32,
    pub z: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyRecord {
    #[serde(rename = "type", default)]
    pub type_tag: String,
    /// Negative means the enemy belongs to no room.
    #[serde(default = "no_room")]
    pub room_id: i32,
    pub position: TilePoint,
    #[serde(default = "first_level")]
    pub level: u32,
    #[serde(default)]
    pub is_boss: bool,
    #[serde(default)]
    pub rotation_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropRecord {
    #[serde(rename = "type", default)]
    pub type_tag: String,
    pub x: f32,
    /// Height in world units; not scaled by the tile size.
    #[serde(default)]
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub rotation_y: f32,
    #[serde(default = "unit_scale")]
    pub scale: f32,
}

/// Monsters placed around a shared center; they activate together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterGroup {
    pub center: TilePoint,
    #[serde(default = "no_room")]
    pub room_id: i32,
    #[serde(default)]
    pub monsters: Vec<EnemyRecord>,
}

fn no_room() -> i32 {
    -1
}

fn first_level() -> u32 {
    1
}

fn unit_scale() -> f32 {
    1.0
}

fn default_name() -> String {
    "Map".into()
}

fn default_extent() -> u32 {
    100
}

/// A map file. Unknown keys (tile data, lighting, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_extent")]
    pub width: u32,
    #[serde(default = "default_extent")]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_position: Option<TilePoint>,
    #[serde(default)]
    pub enemies: Vec<EnemyRecord>,
    #[serde(default)]
    pub placed_props: Vec<PropRecord>,
    #[serde(default)]
    pub monster_groups: Vec<MonsterGroup>,
}

/// Placements ready for a spawn queue.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlacements {
    pub name: String,
    /// World-space point the load-time spawn pass is centered on.
    pub spawn_point: Vec3,
    pub individuals: Vec<EntityPlacement>,
    pub groups: Vec<PlacementGroup>,
}

impl LevelPlacements {
    /// Individuals plus every group member.
    pub fn total(&self) -> usize {
        self.individuals.len() + self.groups.iter().map(PlacementGroup::len).sum::<usize>()
    }
}

impl MapDocument {
    pub fn from_json_str(text: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let map = Self::from_json_str(&text)?;
        tracing::info!(
            path = %path.display(),
            name = %map.name,
            enemies = map.enemies.len(),
            props = map.placed_props.len(),
            groups = map.monster_groups.len(),
            "loaded map"
        );
        Ok(map)
    }

    pub fn to_json_pretty(&self) -> Result<String, LevelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Spawn tile, defaulting to the middle of the map.
    pub fn spawn_tile(&self) -> TilePoint {
        self.spawn_position.unwrap_or(TilePoint {
            x: (self.width / 2) as f32,
            z: (self.depth / 2) as f32,
        })
    }

    /// Convert every record to a placement with world coordinates.
    ///
    /// Placement ids are assigned in document order: enemies, then props,
    /// then group members. Group ids count groups from zero.
    pub fn to_placements(&self, tile_size: f32) -> Result<LevelPlacements, LevelError> {
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(LevelError::InvalidTileSize(tile_size));
        }
        let mut counter = 0u64;
        let mut next_id = || {
            let id = PlacementId(counter);
            counter += 1;
            id
        };

        let mut individuals = Vec::with_capacity(self.enemies.len() + self.placed_props.len());
        for (index, enemy) in self.enemies.iter().enumerate() {
            individuals.push(enemy_placement(next_id(), enemy, tile_size, "enemies", index)?);
        }
        for (index, prop) in self.placed_props.iter().enumerate() {
            individuals.push(prop_placement(next_id(), prop, tile_size, index)?);
        }

        let mut groups = Vec::with_capacity(self.monster_groups.len());
        for (index, group) in self.monster_groups.iter().enumerate() {
            let anchor = world_point(group.center, 0.0, tile_size)
                .ok_or(LevelError::NonFinite { section: "monsterGroups", index })?;
            let mut members = Vec::with_capacity(group.monsters.len());
            for monster in &group.monsters {
                let mut placement = enemy_placement(next_id(), monster, tile_size, "monsterGroups", index)?;
                // Members without a room inherit the group's.
                if placement.meta.region.is_none() {
                    placement.meta.region = region(group.room_id);
                }
                members.push(placement);
            }
            groups.push(PlacementGroup {
                id: GroupId(index as u64),
                anchor,
                members,
            });
        }

        let spawn_point = world_point(self.spawn_tile(), 0.0, tile_size)
            .ok_or(LevelError::NonFinite { section: "spawnPosition", index: 0 })?;
        let placements = LevelPlacements {
            name: self.name.clone(),
            spawn_point,
            individuals,
            groups,
        };
        tracing::debug!(
            name = %placements.name,
            individuals = placements.individuals.len(),
            groups = placements.groups.len(),
            "converted map to placements"
        );
        Ok(placements)
    }
}

fn region(room_id: i32) -> Option<i32> {
    (room_id >= 0).then_some(room_id)
}

fn world_point(tile: TilePoint, y: f32, tile_size: f32) -> Option<Vec3> {
    let point = Vec3::new(tile.x * tile_size, y, tile.z * tile_size);
    point.is_finite().then_some(point)
}

fn enemy_placement(
    id: PlacementId,
    enemy: &EnemyRecord,
    tile_size: f32,
    section: &'static str,
    index: usize,
) -> Result<EntityPlacement, LevelError> {
    if enemy.type_tag.trim().is_empty() {
        return Err(LevelError::MissingType { section, index });
    }
    let position =
        world_point(enemy.position, 0.0, tile_size).ok_or(LevelError::NonFinite { section, index })?;
    let meta = PlacementMeta {
        level: enemy.level.max(1),
        is_boss: enemy.is_boss,
        rotation_y: enemy.rotation_y,
        scale: 1.0,
        region: region(enemy.room_id),
    };
    Ok(EntityPlacement::new(id, PlacementKind::Enemy, enemy.type_tag.as_str(), position).with_meta(meta))
}

fn prop_placement(
    id: PlacementId,
    prop: &PropRecord,
    tile_size: f32,
    index: usize,
) -> Result<EntityPlacement, LevelError> {
    let section = "placedProps";
    if prop.type_tag.trim().is_empty() {
        return Err(LevelError::MissingType { section, index });
    }
    let position = world_point(TilePoint { x: prop.x, z: prop.z }, prop.y, tile_size)
        .ok_or(LevelError::NonFinite { section, index })?;
    let meta = PlacementMeta {
        rotation_y: prop.rotation_y,
        scale: prop.scale,
        ..PlacementMeta::default()
    };
    Ok(EntityPlacement::new(id, PlacementKind::Prop, prop.type_tag.as_str(), position).with_meta(meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "Steves Place",
        "width": 40,
        "depth": 30,
        "tileData": "ignored",
        "spawnPosition": { "x": 5, "z": 6 },
        "enemies": [
            { "type": "goblin", "roomId": -1, "position": { "x": 10, "z": 4 },
              "level": 2, "isBoss": false, "rotationY": 1.5 },
            { "type": "skeleton_lord", "roomId": 3, "position": { "x": 30, "z": 20 },
              "level": 5, "isBoss": true, "rotationY": 0.0 }
        ],
        "placedProps": [
            { "type": "barrel", "x": 2.5, "y": 0.0, "z": 3.0, "rotationY": 0.2, "scale": 1.1 }
        ],
        "monsterGroups": [
            { "center": { "x": 20, "z": 20 }, "roomId": 7,
              "monsters": [
                  { "type": "wolf", "position": { "x": 19, "z": 21 } },
                  { "type": "wolf", "roomId": 2, "position": { "x": 21, "z": 19 } },
                  { "type": "lizard", "position": { "x": 20, "z": 22 } }
              ] }
        ]
    }"#;

    #[test]
    fn parses_map_documents() {
        let map = MapDocument::from_json_str(SAMPLE).unwrap();
        assert_eq!(map.name, "Steves Place");
        assert_eq!(map.enemies.len(), 2);
        assert!(map.enemies[1].is_boss);
        assert_eq!(map.placed_props[0].scale, 1.1);
        assert_eq!(map.monster_groups[0].monsters[0].level, 1);
        assert_eq!(map.monster_groups[0].monsters[0].room_id, -1);
    }

    #[test]
    fn converts_with_sequential_ids_and_scaled_coordinates() {
        let map = MapDocument::from_json_str(SAMPLE).unwrap();
        let level = map.to_placements(2.0).unwrap();

        assert_eq!(level.spawn_point, Vec3::new(10.0, 0.0, 12.0));
        let ids: Vec<u64> = level.individuals.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(level.groups[0].ids().map(|id| id.0).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(level.total(), 6);

        let goblin = &level.individuals[0];
        assert_eq!(goblin.kind, PlacementKind::Enemy);
        assert_eq!(goblin.position, Vec3::new(20.0, 0.0, 8.0));
        assert_eq!(goblin.meta.region, None);
        assert_eq!(goblin.meta.level, 2);
        assert_eq!(level.individuals[1].meta.region, Some(3));

        let barrel = &level.individuals[2];
        assert_eq!(barrel.kind, PlacementKind::Prop);
        assert_eq!(barrel.position, Vec3::new(5.0, 0.0, 6.0));
        assert_eq!(barrel.meta.scale, 1.1);
    }

    #[test]
    fn groups_carry_anchor_and_room() {
        let map = MapDocument::from_json_str(SAMPLE).unwrap();
        let level = map.to_placements(1.0).unwrap();
        let group = &level.groups[0];
        assert_eq!(group.id, GroupId(0));
        assert_eq!(group.anchor, Vec3::new(20.0, 0.0, 20.0));
        let regions: Vec<_> = group.members.iter().map(|m| m.meta.region).collect();
        assert_eq!(regions, vec![Some(7), Some(2), Some(7)]);
    }

    #[test]
    fn spawn_defaults_to_map_center() {
        let map = MapDocument::from_json_str(r#"{ "width": 41, "depth": 20 }"#).unwrap();
        assert_eq!(map.name, "Map");
        assert_eq!(map.spawn_tile(), TilePoint { x: 20.0, z: 10.0 });
        let level = map.to_placements(1.0).unwrap();
        assert_eq!(level.total(), 0);
    }

    #[test]
    fn rejects_bad_input() {
        let map = MapDocument::from_json_str(SAMPLE).unwrap();
        assert!(matches!(map.to_placements(0.0), Err(LevelError::InvalidTileSize(_))));
        assert!(matches!(map.to_placements(f32::NAN), Err(LevelError::InvalidTileSize(_))));

        let untyped = r#"{ "placedProps": [ { "x": 1, "z": 1 } ] }"#;
        let map = MapDocument::from_json_str(untyped).unwrap();
        assert!(matches!(
            map.to_placements(1.0),
            Err(LevelError::MissingType { section: "placedProps", index: 0 })
        ));

        assert!(matches!(MapDocument::from_json_str("{ nope"), Err(LevelError::Json(_))));
    }

    #[test]
    fn load_and_save_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let map = MapDocument::load(&path).unwrap();
        let saved = dir.path().join("saved.json");
        std::fs::write(&saved, map.to_json_pretty().unwrap()).unwrap();
        assert_eq!(MapDocument::load(&saved).unwrap(), map);

        assert!(matches!(
            MapDocument::load(dir.path().join("missing.json")),
            Err(LevelError::Io(_))
        ));
    }
}
