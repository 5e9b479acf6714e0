use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Clock a frame's `timestamp_us` is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameClock {
    /// Unix epoch microseconds.
    Absolute,
    /// Microseconds since video start; no epoch anchor was available.
    MediaRelative,
}

/// Sensor platform position and orientation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_msl_m: Option<f64>,
    /// Height above the take-off point (subtitle telemetry only)
    pub relative_alt_m: Option<f64>,
    pub true_heading_deg: Option<f64>,
    pub pitch_deg: Option<f64>,
    pub roll_deg: Option<f64>,
    pub h_fov_deg: Option<f64>,
    pub v_fov_deg: Option<f64>,
}

impl SensorState {
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

/// Frame center: the ground point the sensor is looking at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: Option<f64>,
}

/// Sensor pointing relative to the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookGeometry {
    pub relative_azimuth_deg: Option<f64>,
    pub relative_elevation_deg: Option<f64>,
    pub relative_roll_deg: Option<f64>,
    pub slant_range_m: Option<f64>,
    pub target_width_m: Option<f64>,
}

/// One decoded telemetry sample, keyed by its timestamp.
///
/// Frames are produced by the frame assembler (KLV) or the subtitle parser
/// and are never mutated once handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp_us: u64,
    pub clock: FrameClock,
    /// Cue start relative to video start (subtitle telemetry only)
    pub media_offset_us: Option<u64>,

    pub sensor: SensorState,
    pub target: Option<TargetPoint>,
    pub look: LookGeometry,

    pub mission_id: Option<String>,
    pub platform_designation: Option<String>,
}

impl TelemetryFrame {
    pub fn new(timestamp_us: u64, clock: FrameClock) -> Self {
        Self {
            timestamp_us,
            clock,
            media_offset_us: None,
            sensor: SensorState::default(),
            target: None,
            look: LookGeometry::default(),
            mission_id: None,
            platform_designation: None,
        }
    }

    /// Wall-clock time of the frame, if it carries an absolute timestamp.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        if self.clock != FrameClock::Absolute {
            return None;
        }
        let micros = i64::try_from(self.timestamp_us).ok()?;
        Utc.timestamp_micros(micros).single()
    }
}

/// Latitude in degrees, or `None` outside [-90, 90].
pub fn checked_latitude(value: f64) -> Option<f64> {
    (value.is_finite() && (-90.0..=90.0).contains(&value)).then_some(value)
}

/// Longitude in degrees, or `None` outside [-180, 180].
pub fn checked_longitude(value: f64) -> Option<f64> {
    (value.is_finite() && (-180.0..=180.0).contains(&value)).then_some(value)
}
