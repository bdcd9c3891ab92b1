//! Tuning parameters, validated once at setup.
//!
//! Raw `*Config` structs are what files and callers provide; `validate()`
//! turns them into `*Settings` that the runtime trusts without re-checking.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lod::LodThresholds;

/// Setup-time validation failures. Runtime problems are never reported here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one LOD threshold is required")]
    EmptyThresholds,
    #[error("LOD threshold {index} is not a finite non-negative distance: {value}")]
    InvalidThreshold { index: usize, value: f32 },
    #[error("LOD thresholds must be strictly ascending: threshold {index} ({value}) does not exceed {previous}")]
    NonMonotonicThresholds { index: usize, previous: f32, value: f32 },
    #[error("too many LOD thresholds: {0} (at most 255)")]
    TooManyThresholds(usize),
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must be a finite non-negative number, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} is too large to be a duration: {value}")]
    DurationOutOfRange { field: &'static str, value: f32 },
    #[error("per-tick spawn cap must be at least 1")]
    ZeroSpawnCap,
}

/// Errors from loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// How a tier change spanning several levels is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscontinuityPolicy {
    /// One notification with the final tier.
    #[default]
    Jump,
    /// One notification per intermediate tier, in order.
    Traverse,
}

/// LOD scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Side length of a spatial index cell in world units.
    pub cell_size: f32,
    /// Ascending distance boundaries; beyond the last one objects are culled.
    pub thresholds: Vec<f32>,
    /// Sort and deduplicate thresholds instead of rejecting them.
    pub normalize_thresholds: bool,
    /// Minimum time between evaluation passes.
    pub interval_secs: f32,
    /// The observer must move farther than this between passes.
    pub movement_threshold: f32,
    /// Observer displacement that triggers a pass immediately.
    pub teleport_distance: Option<f32>,
    pub discontinuity: DiscontinuityPolicy,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            thresholds: vec![15.0, 30.0, 50.0, 80.0],
            normalize_thresholds: false,
            interval_secs: 0.25,
            movement_threshold: 1.0,
            teleport_distance: None,
            discontinuity: DiscontinuityPolicy::Jump,
        }
    }
}

/// Validated form of [`LodConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct LodSettings {
    pub cell_size: f32,
    pub thresholds: LodThresholds,
    pub interval: Duration,
    pub movement_threshold: f32,
    pub teleport_distance: Option<f32>,
    pub discontinuity: DiscontinuityPolicy,
}

impl LodConfig {
    pub fn validate(&self) -> Result<LodSettings, ConfigError> {
        let thresholds = if self.normalize_thresholds {
            LodThresholds::normalized(self.thresholds.clone())?
        } else {
            LodThresholds::new(self.thresholds.clone())?
        };
        Ok(LodSettings {
            cell_size: positive("cell_size", self.cell_size)?,
            thresholds,
            interval: seconds("interval_secs", self.interval_secs)?,
            movement_threshold: non_negative("movement_threshold", self.movement_threshold)?,
            teleport_distance: self
                .teleport_distance
                .map(|d| non_negative("teleport_distance", d))
                .transpose()?,
            discontinuity: self.discontinuity,
        })
    }
}

/// Deferred spawn queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Radius around the spawn point materialized at load time.
    pub near_radius: f32,
    /// Radius around the observer within which pending placements activate.
    pub activation_radius: f32,
    /// Minimum time between steady-state scans.
    pub interval_secs: f32,
    /// Maximum materializations per scan.
    pub per_tick_cap: usize,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            near_radius: 30.0,
            activation_radius: 60.0,
            interval_secs: 0.5,
            per_tick_cap: 10,
        }
    }
}

/// Validated form of [`SpawnConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSettings {
    pub near_radius: f32,
    pub activation_radius: f32,
    pub interval: Duration,
    pub per_tick_cap: usize,
}

impl SpawnConfig {
    pub fn validate(&self) -> Result<SpawnSettings, ConfigError> {
        if self.per_tick_cap == 0 {
            return Err(ConfigError::ZeroSpawnCap);
        }
        Ok(SpawnSettings {
            near_radius: non_negative("near_radius", self.near_radius)?,
            activation_radius: positive("activation_radius", self.activation_radius)?,
            interval: seconds("interval_secs", self.interval_secs)?,
            per_tick_cap: self.per_tick_cap,
        })
    }
}

/// Top-level config file: one section per subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub lod: LodConfig,
    pub spawn: SpawnConfig,
}

impl StreamConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, LoadError> {
        let config: StreamConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lod.validate()?;
        self.spawn.validate()?;
        Ok(())
    }
}

pub(crate) fn positive(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn seconds(field: &'static str, value: f32) -> Result<Duration, ConfigError> {
    let value = non_negative(field, value)?;
    Duration::try_from_secs_f32(value).map_err(|_| ConfigError::DurationOutOfRange { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let lod = LodConfig::default().validate().unwrap();
        assert_eq!(lod.thresholds.bounds(), &[15.0, 30.0, 50.0, 80.0]);
        assert_eq!(lod.interval, Duration::from_millis(250));
        assert_eq!(lod.discontinuity, DiscontinuityPolicy::Jump);

        let spawn = SpawnConfig::default().validate().unwrap();
        assert_eq!(spawn.per_tick_cap, 10);
        assert_eq!(spawn.interval, Duration::from_millis(500));
    }

    #[test]
    fn rejects_non_monotonic_thresholds() {
        let config = LodConfig {
            thresholds: vec![15.0, 50.0, 30.0],
            ..LodConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonMonotonicThresholds {
                index: 2,
                previous: 50.0,
                value: 30.0
            })
        );
    }

    #[test]
    fn normalizes_thresholds_when_asked() {
        let config = LodConfig {
            thresholds: vec![50.0, 15.0, 30.0, 30.0],
            normalize_thresholds: true,
            ..LodConfig::default()
        };
        let settings = config.validate().unwrap();
        assert_eq!(settings.thresholds.bounds(), &[15.0, 30.0, 50.0]);
    }

    #[test]
    fn rejects_bad_scalars() {
        let config = LodConfig {
            cell_size: 0.0,
            ..LodConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "cell_size", .. })
        ));

        let config = LodConfig {
            interval_secs: -1.0,
            ..LodConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { field: "interval_secs", .. })
        ));

        let config = LodConfig {
            teleport_distance: Some(f32::NAN),
            ..LodConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative { field: "teleport_distance", .. })
        ));

        let config = SpawnConfig {
            per_tick_cap: 0,
            ..SpawnConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSpawnCap));

        let config = SpawnConfig {
            activation_radius: f32::INFINITY,
            ..SpawnConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let config = LodConfig {
            interval_secs: 1.0e30,
            ..LodConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DurationOutOfRange {
                field: "interval_secs",
                value: 1.0e30
            })
        );

        let config = SpawnConfig {
            interval_secs: f32::MAX,
            ..SpawnConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationOutOfRange { field: "interval_secs", .. })
        ));

        let yaml = "spawn:\n  interval_secs: 1.0e30\n";
        assert!(matches!(
            StreamConfig::from_yaml_str(yaml),
            Err(LoadError::Invalid(ConfigError::DurationOutOfRange { .. }))
        ));
    }

    #[test]
    fn yaml_sections_fill_from_defaults() {
        let yaml = "
lod:
  thresholds: [10, 20]
  discontinuity: traverse
  teleport_distance: 100
spawn:
  per_tick_cap: 4
";
        let config = StreamConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.lod.thresholds, vec![10.0, 20.0]);
        assert_eq!(config.lod.discontinuity, DiscontinuityPolicy::Traverse);
        assert_eq!(config.lod.teleport_distance, Some(100.0));
        assert_eq!(config.lod.cell_size, 16.0);
        assert_eq!(config.spawn.per_tick_cap, 4);
        assert_eq!(config.spawn.activation_radius, 60.0);
    }

    #[test]
    fn yaml_with_invalid_values_is_rejected() {
        let yaml = "lod:\n  thresholds: [30, 15]\n";
        assert!(matches!(
            StreamConfig::from_yaml_str(yaml),
            Err(LoadError::Invalid(ConfigError::NonMonotonicThresholds { .. }))
        ));
        assert!(matches!(
            StreamConfig::from_yaml_str("lod: [1, 2"),
            Err(LoadError::Yaml(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.yaml");
        std::fs::write(&path, "spawn:\n  near_radius: 12.5\n").unwrap();

        let config = StreamConfig::load(&path).unwrap();
        assert_eq!(config.spawn.near_radius, 12.5);

        let missing = StreamConfig::load(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(LoadError::Io(_))));
    }
}
