use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::GeointConfig;
use crate::error::{GeointError, Result, TelemetryFormat};
use crate::models::{CorrelatedSegment, SubtitleCue, TelemetryFrame, TranscriptSegment};
use crate::services::{
    DecodeFailures, MissionSummary, StreamDecoder, TagRegistry, TelemetryInput, TemporalCorrelator,
};

/// Everything learned about one video's telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeointReport {
    pub format: TelemetryFormat,
    pub frames: Vec<TelemetryFrame>,
    pub failures: DecodeFailures,
    pub segments: Vec<CorrelatedSegment>,
    pub summary: MissionSummary,
}

/// Decode a video's telemetry and attach it to the transcript.
pub fn annotate_video(
    input: TelemetryInput<'_>,
    transcript: &[TranscriptSegment],
    config: &GeointConfig,
) -> Result<GeointReport> {
    let decoder = StreamDecoder::new(TagRegistry::st0601(), config.decode.clone());
    let decoded = decoder.decode(input)?;

    let segments =
        TemporalCorrelator::new(&decoded.frames, config.correlation.clone()).correlate(transcript);
    let summary = MissionSummary::from_frames(&decoded.frames);

    tracing::info!(
        format = %decoded.format,
        frames = summary.frame_count,
        failures = decoded.failures.total(),
        duration_secs = summary.duration_secs,
        "video annotated"
    );

    Ok(GeointReport {
        format: decoded.format,
        frames: decoded.frames,
        failures: decoded.failures,
        segments,
        summary,
    })
}

/// Like [`annotate_video`], but a video without telemetry still yields every
/// transcript segment, each with no telemetry attached.
pub fn annotate_segments(
    input: TelemetryInput<'_>,
    transcript: &[TranscriptSegment],
    config: &GeointConfig,
) -> Vec<CorrelatedSegment> {
    match annotate_video(input, transcript, config) {
        Ok(report) => report.segments,
        Err(e) => {
            match &e {
                GeointError::NoTelemetryFound { .. } => tracing::info!("{}", e),
                _ => tracing::warn!("Telemetry decode failed: {}", e),
            }
            transcript
                .iter()
                .cloned()
                .map(|segment| CorrelatedSegment::new(segment, None, false))
                .collect()
        }
    }
}

/// Read a demuxed telemetry stream (KLV or subtitle file) from disk.
pub fn annotate_file<P: AsRef<Path>>(
    path: P,
    transcript: &[TranscriptSegment],
    config: &GeointConfig,
) -> anyhow::Result<GeointReport> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read telemetry stream: {:?}", path))?;
    annotate_video(TelemetryInput::Bytes(&data), transcript, config)
        .with_context(|| format!("Failed to annotate {:?}", path))
}

/// Owned telemetry for a batch job.
#[derive(Debug, Clone)]
pub enum TelemetrySource {
    Bytes(Vec<u8>),
    Cues(Vec<SubtitleCue>),
}

impl TelemetrySource {
    pub fn as_input(&self) -> TelemetryInput<'_> {
        match self {
            TelemetrySource::Bytes(data) => TelemetryInput::Bytes(data),
            TelemetrySource::Cues(cues) => TelemetryInput::Cues(cues),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub name: String,
    pub source: TelemetrySource,
    pub transcript: Vec<TranscriptSegment>,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: std::result::Result<GeointReport, String>,
}

/// Annotate independent videos in parallel on the blocking pool. Outcomes come
/// back in job order; a failed video never stops the rest.
pub async fn annotate_batch(jobs: Vec<BatchJob>, config: GeointConfig) -> Vec<BatchOutcome> {
    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let config = config.clone();
        let name = job.name.clone();
        let handle = tokio::task::spawn_blocking(move || {
            annotate_video(job.source.as_input(), &job.transcript, &config)
        });
        handles.push((name, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => {
                tracing::warn!("Failed to annotate {}: {}", name, e);
                Err(e.to_string())
            }
            Err(e) => {
                tracing::error!("Annotation task for {} panicked: {}", name, e);
                Err(e.to_string())
            }
        };
        outcomes.push(BatchOutcome { name, result });
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::info!(videos = outcomes.len(), failed, "batch annotation finished");
    outcomes
}
