//! Geospatial annotation for video transcripts.
//!
//! Decodes embedded platform telemetry (MISB ST 0601 KLV or drone SRT/WebVTT
//! subtitles), matches each transcript segment with the frame in effect when
//! it was spoken, and exports the flight as KML, GeoJSON and an offline
//! HTML map.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use commands::{
    annotate_batch, annotate_file, annotate_segments, annotate_video, export_mission, BatchJob,
    BatchOutcome, ExportedFiles, GeointReport, TelemetrySource,
};
pub use config::{CorrelationConfig, DecodeConfig, ExportConfig, GeointConfig, MatchPolicy};
pub use error::{GeointError, PacketError, Result, TelemetryFormat};
pub use models::{CorrelatedSegment, SubtitleCue, TelemetryFrame, TranscriptSegment};
pub use services::{StreamDecoder, TagRegistry, TelemetryInput, TemporalCorrelator};
