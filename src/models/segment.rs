use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TelemetryFrame;

/// A transcript segment as delivered by the transcription service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_offset_seconds: f64,
    pub end_offset_seconds: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_offset_seconds: f64, end_offset_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_offset_seconds,
            end_offset_seconds,
        }
    }
}

/// A transcript segment paired with the telemetry in effect when it was spoken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedSegment {
    pub id: String,
    pub segment: TranscriptSegment,
    pub telemetry: Option<TelemetryFrame>,
    pub likely_visual_observation: bool,
}

impl CorrelatedSegment {
    pub fn new(
        segment: TranscriptSegment,
        telemetry: Option<TelemetryFrame>,
        likely_visual_observation: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            segment,
            telemetry,
            likely_visual_observation,
        }
    }

    /// The per-segment `geoint` block, absent when no telemetry matched.
    pub fn geoint(&self) -> Option<GeointAnnotation> {
        let frame = self.telemetry.as_ref()?;
        Some(GeointAnnotation {
            timestamp_us: frame.timestamp_us,
            sensor: SensorFix {
                lat: frame.sensor.lat,
                lon: frame.sensor.lon,
                alt: frame.sensor.alt_msl_m.or(frame.sensor.relative_alt_m),
            },
            target: frame.target.as_ref().map(|t| TargetFix {
                lat: t.lat,
                lon: t.lon,
            }),
            likely_visual_observation: self.likely_visual_observation,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFix {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFix {
    pub lat: f64,
    pub lon: f64,
}

/// Structured annotation attached to a transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeointAnnotation {
    pub timestamp_us: u64,
    pub sensor: SensorFix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetFix>,
    pub likely_visual_observation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameClock, TargetPoint};

    #[test]
    fn test_geoint_block() {
        let mut frame = TelemetryFrame::new(42, FrameClock::Absolute);
        frame.sensor.lat = Some(10.0);
        frame.sensor.lon = Some(20.0);
        frame.sensor.alt_msl_m = Some(300.0);
        frame.target = Some(TargetPoint {
            lat: 10.1,
            lon: 20.1,
            elevation_m: None,
        });

        let seg = CorrelatedSegment::new(TranscriptSegment::new("hello", 0.0, 1.0), Some(frame), true);
        let geoint = seg.geoint().unwrap();
        assert_eq!(geoint.timestamp_us, 42);
        assert_eq!(geoint.sensor.alt, Some(300.0));
        assert_eq!(geoint.target, Some(TargetFix { lat: 10.1, lon: 20.1 }));
        assert!(geoint.likely_visual_observation);

        let json = serde_json::to_value(&geoint).unwrap();
        assert_eq!(json["sensor"]["lat"], 10.0);
    }

    #[test]
    fn test_no_geoint_without_telemetry() {
        let seg = CorrelatedSegment::new(TranscriptSegment::new("quiet", 2.0, 3.0), None, false);
        assert!(seg.geoint().is_none());
        assert!(!seg.id.is_empty());
    }
}
