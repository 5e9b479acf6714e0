//! Aligns telemetry (absolute clock) with transcript segments (media clock).
//!
//! KLV frames are placed on the media timeline by assuming the earliest frame
//! was captured at video time zero. Subtitle frames already know their offset
//! into the video and use it directly.

use crate::config::{CorrelationConfig, MatchPolicy};
use crate::models::{CorrelatedSegment, TelemetryFrame, TranscriptSegment};

pub struct TemporalCorrelator<'f> {
    frames: &'f [TelemetryFrame],
    /// (media time in microseconds, index into `frames`), ascending
    timeline: Vec<(u64, usize)>,
    config: CorrelationConfig,
}

impl<'f> TemporalCorrelator<'f> {
    pub fn new(frames: &'f [TelemetryFrame], config: CorrelationConfig) -> Self {
        let anchor = frames
            .iter()
            .filter(|f| f.media_offset_us.is_none())
            .map(|f| f.timestamp_us)
            .min()
            .unwrap_or(0);

        let mut timeline: Vec<(u64, usize)> = frames
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let media_us = f
                    .media_offset_us
                    .unwrap_or_else(|| f.timestamp_us.saturating_sub(anchor));
                (media_us, i)
            })
            .collect();
        // already sorted for decoder output; sort_by_key is linear on sorted input
        timeline.sort_by_key(|&(media_us, i)| (media_us, i));

        Self {
            frames,
            timeline,
            config,
        }
    }

    /// One correlated segment per transcript segment, in input order.
    pub fn correlate(&self, segments: &[TranscriptSegment]) -> Vec<CorrelatedSegment> {
        let correlated: Vec<CorrelatedSegment> = segments
            .iter()
            .map(|segment| {
                let frame = self.match_segment(segment);
                let visual = frame.is_some_and(|f| self.likely_visual_observation(f));
                CorrelatedSegment::new(segment.clone(), frame.cloned(), visual)
            })
            .collect();

        let matched = correlated.iter().filter(|c| c.telemetry.is_some()).count();
        tracing::info!(
            segments = correlated.len(),
            matched,
            frames = self.frames.len(),
            "transcript correlated with telemetry"
        );
        correlated
    }

    /// Frame in effect at the segment's start, if one lies within tolerance.
    pub fn match_segment(&self, segment: &TranscriptSegment) -> Option<&'f TelemetryFrame> {
        if self.timeline.is_empty() || !segment.start_offset_seconds.is_finite() {
            return None;
        }
        let target_us = seconds_to_us(segment.start_offset_seconds.max(0.0));
        let tolerance_us = seconds_to_us(self.config.tolerance_secs);

        // frames at or before the segment start
        let after = self.timeline.partition_point(|&(media_us, _)| media_us <= target_us);

        let (media_us, index) = match self.config.policy {
            MatchPolicy::LastKnown => self.timeline[after.saturating_sub(1)],
            MatchPolicy::Nearest => {
                let before = after.checked_sub(1).map(|i| self.timeline[i]);
                let next = self.timeline.get(after).copied();
                match (before, next) {
                    (Some(b), Some(n)) if n.0 - target_us < target_us - b.0 => n,
                    (Some(b), _) => b,
                    (None, Some(n)) => n,
                    (None, None) => return None,
                }
            }
        };

        (media_us.abs_diff(target_us) <= tolerance_us).then(|| &self.frames[index])
    }

    /// Best-effort: a narrow horizontal FOV suggests the camera is zoomed in
    /// on something deliberately. Off unless a threshold is configured.
    fn likely_visual_observation(&self, frame: &TelemetryFrame) -> bool {
        match (self.config.narrow_fov_deg, frame.sensor.h_fov_deg) {
            (Some(max_fov), Some(fov)) => fov <= max_fov,
            _ => false,
        }
    }
}

fn seconds_to_us(seconds: f64) -> u64 {
    (seconds * 1_000_000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrameClock;

    const T0: u64 = 1_700_000_000_000_000;

    fn frame(offset_secs: u64) -> TelemetryFrame {
        TelemetryFrame::new(T0 + offset_secs * 1_000_000, FrameClock::Absolute)
    }

    fn segment(start: f64) -> TranscriptSegment {
        TranscriptSegment::new("...", start, start + 1.0)
    }

    #[test]
    fn test_tolerance_boundary() {
        let frames = vec![frame(0), frame(10)];
        let correlator = TemporalCorrelator::new(&frames, CorrelationConfig::default());

        let near = correlator.match_segment(&segment(4.9)).unwrap();
        assert_eq!(near.timestamp_us, T0);
        assert!(correlator.match_segment(&segment(5.1)).is_none());
    }

    #[test]
    fn test_nearest_policy() {
        let frames = vec![frame(0), frame(10)];
        let config = CorrelationConfig {
            policy: MatchPolicy::Nearest,
            ..Default::default()
        };
        let correlator = TemporalCorrelator::new(&frames, config);

        assert_eq!(correlator.match_segment(&segment(4.9)).unwrap().timestamp_us, T0);
        assert_eq!(
            correlator.match_segment(&segment(5.1)).unwrap().timestamp_us,
            T0 + 10_000_000
        );
        assert!(correlator.match_segment(&segment(15.5)).is_none());
    }

    #[test]
    fn test_exact_match_and_after_last_frame() {
        let frames = vec![frame(0), frame(1), frame(2)];
        let correlator = TemporalCorrelator::new(&frames, CorrelationConfig::default());

        assert_eq!(correlator.match_segment(&segment(1.0)).unwrap().timestamp_us, T0 + 1_000_000);
        assert_eq!(correlator.match_segment(&segment(6.5)).unwrap().timestamp_us, T0 + 2_000_000);
        assert!(correlator.match_segment(&segment(7.5)).is_none());
    }

    #[test]
    fn test_unsorted_frames() {
        let frames = vec![frame(2), frame(0), frame(1)];
        let correlator = TemporalCorrelator::new(&frames, CorrelationConfig::default());
        assert_eq!(correlator.match_segment(&segment(1.2)).unwrap().timestamp_us, T0 + 1_000_000);
    }

    #[test]
    fn test_media_relative_frames_use_offset() {
        let mut frames = Vec::new();
        for secs in [3u64, 4] {
            let mut f = TelemetryFrame::new(secs * 1_000_000, FrameClock::MediaRelative);
            f.media_offset_us = Some(secs * 1_000_000);
            frames.push(f);
        }
        let config = CorrelationConfig {
            tolerance_secs: 0.5,
            ..Default::default()
        };
        let correlator = TemporalCorrelator::new(&frames, config);

        // no anchoring on the first frame: t=3.2 maps to the 3s cue
        assert_eq!(correlator.match_segment(&segment(3.2)).unwrap().timestamp_us, 3_000_000);
        // the 3s cue is 3s away from t=0
        assert!(correlator.match_segment(&segment(0.0)).is_none());
    }

    #[test]
    fn test_visual_observation_threshold() {
        let mut zoomed = frame(0);
        zoomed.sensor.h_fov_deg = Some(4.0);
        let mut wide = frame(1);
        wide.sensor.h_fov_deg = Some(60.0);
        let frames = vec![zoomed, wide];
        let segments = vec![segment(0.0), segment(1.0)];

        let off = TemporalCorrelator::new(&frames, CorrelationConfig::default()).correlate(&segments);
        assert!(off.iter().all(|c| !c.likely_visual_observation));

        let config = CorrelationConfig {
            narrow_fov_deg: Some(10.0),
            ..Default::default()
        };
        let on = TemporalCorrelator::new(&frames, config).correlate(&segments);
        assert!(on[0].likely_visual_observation);
        assert!(!on[1].likely_visual_observation);
    }

    #[test]
    fn test_no_frames() {
        let correlated = TemporalCorrelator::new(&[], CorrelationConfig::default()).correlate(&[segment(0.0)]);
        assert_eq!(correlated.len(), 1);
        assert!(correlated[0].telemetry.is_none());
    }
}
