//! Level data: map documents and the placements they describe.
//!
//! Maps are JSON with camelCase keys. Coordinates in a map are tile
//! coordinates; converting to placements scales them into world units.

mod map;

pub use map::{EnemyRecord, LevelPlacements, MapDocument, MonsterGroup, PropRecord, TilePoint};

/// Errors from reading or converting a map.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tile size must be a positive finite number, got {0}")]
    InvalidTileSize(f32),
    #[error("{section} record {index} has no type")]
    MissingType { section: &'static str, index: usize },
    #[error("{section} record {index} has a non-finite coordinate")]
    NonFinite { section: &'static str, index: usize },
}

pub fn crate_info() -> &'static str {
    "proxim-level v0.1.0"
}
