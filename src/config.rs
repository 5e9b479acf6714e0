use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GeointError, Result};

/// Bundled configuration, identical to `GeointConfig::default()`.
pub const DEFAULT_CONFIG: &str = r#"{
  "decode": {
    "epoch_anchor_us": null,
    "sort_frames": true
  },
  "correlation": {
    "tolerance_secs": 5.0,
    "policy": "last_known",
    "narrow_fov_deg": null
  },
  "export": {
    "title": "Mission",
    "sensor_color": "ff0000ff",
    "target_color": "ffffaa00",
    "map_width": 960,
    "map_height": 640
  }
}"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeointConfig {
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Unix microseconds at video time zero, for subtitle telemetry that
    /// carries no date-time of its own
    #[serde(default)]
    pub epoch_anchor_us: Option<u64>,
    #[serde(default = "default_sort_frames")]
    pub sort_frames: bool,
}

fn default_sort_frames() -> bool {
    true
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            epoch_anchor_us: None,
            sort_frames: default_sort_frames(),
        }
    }
}

/// Which frame a transcript segment is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Latest frame at or before the segment start; the first frame when the
    /// segment precedes all telemetry.
    #[default]
    LastKnown,
    /// Frame closest in time on either side.
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Largest time distance (seconds) at which a frame still matches
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: f64,
    #[serde(default)]
    pub policy: MatchPolicy,
    /// Horizontal FOV (degrees) at or below which the camera counts as
    /// zoomed in on a target. Unset disables the heuristic.
    #[serde(default)]
    pub narrow_fov_deg: Option<f64>,
}

fn default_tolerance_secs() -> f64 {
    5.0
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance_secs(),
            policy: MatchPolicy::default(),
            narrow_fov_deg: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// KML `aabbggrr` color of the sensor track
    #[serde(default = "default_sensor_color")]
    pub sensor_color: String,
    #[serde(default = "default_target_color")]
    pub target_color: String,
    #[serde(default = "default_map_width")]
    pub map_width: u32,
    #[serde(default = "default_map_height")]
    pub map_height: u32,
}

fn default_title() -> String {
    "Mission".to_string()
}

fn default_sensor_color() -> String {
    "ff0000ff".to_string()
}

fn default_target_color() -> String {
    "ffffaa00".to_string()
}

fn default_map_width() -> u32 {
    960
}

fn default_map_height() -> u32 {
    640
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            sensor_color: default_sensor_color(),
            target_color: default_target_color(),
            map_width: default_map_width(),
            map_height: default_map_height(),
        }
    }
}

impl GeointConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GeointConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to load config: {:?}", path.as_ref()))
    }

    pub fn validate(&self) -> Result<()> {
        let tolerance = self.correlation.tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(GeointError::InvalidConfig(format!(
                "correlation.tolerance_secs must be a non-negative number, got {tolerance}"
            )));
        }
        if let Some(fov) = self.correlation.narrow_fov_deg {
            if !fov.is_finite() || fov <= 0.0 {
                return Err(GeointError::InvalidConfig(format!(
                    "correlation.narrow_fov_deg must be positive, got {fov}"
                )));
            }
        }
        for color in [&self.export.sensor_color, &self.export.target_color] {
            if color.len() != 8 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(GeointError::InvalidConfig(format!(
                    "export colors must be 8 hex digits (aabbggrr), got {color:?}"
                )));
            }
        }
        if self.export.map_width == 0 || self.export.map_height == 0 {
            return Err(GeointError::InvalidConfig("export map size must be non-zero".into()));
        }
        Ok(())
    }
}
