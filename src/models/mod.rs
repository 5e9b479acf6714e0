mod cue;
mod segment;
mod telemetry;

pub use cue::SubtitleCue;
pub use segment::{CorrelatedSegment, GeointAnnotation, SensorFix, TargetFix, TranscriptSegment};
pub use telemetry::{
    checked_latitude, checked_longitude, FrameClock, LookGeometry, SensorState, TargetPoint,
    TelemetryFrame,
};
