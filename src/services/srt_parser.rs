use crate::models::{checked_latitude, checked_longitude, FrameClock, SubtitleCue, TelemetryFrame};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// Full-frame sensor dimensions (mm) behind a 35mm-equivalent focal length
const FULL_FRAME_WIDTH_MM: f64 = 36.0;
const FULL_FRAME_HEIGHT_MM: f64 = 24.0;

/// Cues parsed from an SRT or WebVTT document.
#[derive(Debug, Clone, Default)]
pub struct SubtitleTrack {
    pub cues: Vec<SubtitleCue>,
    /// Blocks that looked like cues but had no parseable time range
    pub malformed_blocks: usize,
}

/// Telemetry fields found in one cue's text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueTelemetry {
    pub recorded_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rel_alt: Option<f64>,
    pub abs_alt: Option<f64>,
    pub gimbal_yaw: Option<f64>,
    pub gimbal_pitch: Option<f64>,
    pub gimbal_roll: Option<f64>,
    pub focal_len: Option<f64>,
}

pub struct SrtParser {
    // Regex patterns for parsing SRT/VTT content
    time_pattern: Regex,
    latitude_pattern: Regex,
    longitude_pattern: Regex,
    rel_alt_pattern: Regex,
    abs_alt_pattern: Regex,
    altitude_pattern: Regex,
    gb_yaw_pattern: Regex,
    gb_pitch_pattern: Regex,
    gb_roll_pattern: Regex,
    focal_len_pattern: Regex,
    legacy_gps_pattern: Regex,
    timestamp_pattern: Regex,
}

impl SrtParser {
    pub fn new() -> Self {
        Self {
            time_pattern: Regex::new(
                r"(?:(\d+):)?(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(?:(\d+):)?(\d{2}):(\d{2})[,.](\d{3})",
            )
            .unwrap(),
            latitude_pattern: Regex::new(r"\[latitude\s*:\s*([^\]\s]+)").unwrap(),
            // DJI firmware spells it both ways
            longitude_pattern: Regex::new(r"\[(?:longitude|longtitude)\s*:\s*([^\]\s]+)").unwrap(),
            rel_alt_pattern: Regex::new(r"rel_alt\s*:\s*([^\]\s]+)").unwrap(),
            abs_alt_pattern: Regex::new(r"abs_alt\s*:\s*([^\]\s]+)").unwrap(),
            altitude_pattern: Regex::new(r"\[altitude\s*:\s*([^\]\s]+)").unwrap(),
            gb_yaw_pattern: Regex::new(r"\[gb_yaw\s*:\s*([^\]\s]+)").unwrap(),
            gb_pitch_pattern: Regex::new(r"\[gb_pitch\s*:\s*([^\]\s]+)").unwrap(),
            gb_roll_pattern: Regex::new(r"\[gb_roll\s*:\s*([^\]\s]+)").unwrap(),
            focal_len_pattern: Regex::new(r"\[focal_len\s*:\s*([^\]\s]+)").unwrap(),
            // Older firmware: GPS(lon,lat,alt)
            legacy_gps_pattern: Regex::new(
                r"GPS\s*\(\s*(-?[\d.]+)\s*,\s*(-?[\d.]+)\s*,\s*(-?[\d.]+)",
            )
            .unwrap(),
            timestamp_pattern: Regex::new(
                r"(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[.,]\d{1,6})?)",
            )
            .unwrap(),
        }
    }

    /// Parse an SRT/VTT file into cues
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<SubtitleTrack> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read subtitle file: {:?}", path.as_ref()))?;

        Ok(self.parse_content(&content))
    }

    /// Parse SRT or WebVTT content into cues
    pub fn parse_content(&self, content: &str) -> SubtitleTrack {
        let mut track = SubtitleTrack::default();
        let normalized = content.replace("\r\n", "\n");

        // Split by blank lines to get individual subtitle blocks
        for block in normalized.split("\n\n") {
            let block = block.trim_matches('\n');
            if block.trim().is_empty() || is_vtt_header(block) {
                continue;
            }

            match self.parse_block(block) {
                Some(cue) => track.cues.push(cue),
                None => track.malformed_blocks += 1,
            }
        }

        track
    }

    fn parse_block(&self, block: &str) -> Option<SubtitleCue> {
        let lines: Vec<&str> = block.lines().collect();

        // The index line is optional (always absent in most VTT files)
        let time_line = lines.iter().position(|l| l.contains("-->"))?;
        let (start_ms, end_ms) = self.parse_timecode(lines[time_line])?;

        let text = lines[time_line + 1..].join("\n");
        Some(SubtitleCue::new(start_ms, end_ms, text))
    }

    fn parse_timecode(&self, line: &str) -> Option<(u64, u64)> {
        let caps = self.time_pattern.captures(line)?;

        let start = timecode_ms(&caps, 1)?;
        let end = timecode_ms(&caps, 5)?;

        Some((start, end))
    }

    /// Pull the bracketed telemetry fields out of a cue's text
    pub fn extract(&self, text: &str) -> CueTelemetry {
        let mut telemetry = CueTelemetry::default();

        if let Some(caps) = self.timestamp_pattern.captures(text) {
            let stamp = caps[1].replace(',', ".");
            if let Ok(dt) = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S%.f") {
                telemetry.recorded_at = Some(Utc.from_utc_datetime(&dt));
            }
        }

        telemetry.latitude = capture_f64(&self.latitude_pattern, text);
        telemetry.longitude = capture_f64(&self.longitude_pattern, text);
        telemetry.rel_alt = capture_f64(&self.rel_alt_pattern, text);
        telemetry.abs_alt =
            capture_f64(&self.abs_alt_pattern, text).or_else(|| capture_f64(&self.altitude_pattern, text));

        if let Some(caps) = self.legacy_gps_pattern.captures(text) {
            telemetry.longitude = telemetry.longitude.or_else(|| caps[1].parse().ok());
            telemetry.latitude = telemetry.latitude.or_else(|| caps[2].parse().ok());
            telemetry.abs_alt = telemetry.abs_alt.or_else(|| caps[3].parse().ok());
        }

        // Extract gimbal orientation
        telemetry.gimbal_yaw = capture_f64(&self.gb_yaw_pattern, text);
        telemetry.gimbal_pitch = capture_f64(&self.gb_pitch_pattern, text);
        telemetry.gimbal_roll = capture_f64(&self.gb_roll_pattern, text);
        telemetry.focal_len = capture_f64(&self.focal_len_pattern, text);

        telemetry
    }

    /// Epoch anchor implied by the first cue carrying a date-time line:
    /// its wall-clock time minus its offset into the video.
    pub fn epoch_anchor(&self, cues: &[SubtitleCue]) -> Option<u64> {
        cues.iter().find_map(|cue| {
            let recorded_at = self.extract(&cue.text).recorded_at?;
            let micros = u64::try_from(recorded_at.timestamp_micros()).ok()?;
            micros.checked_sub(cue.start_ms.checked_mul(1000)?)
        })
    }

    /// Build the frame for one cue. Missing or malformed fields stay absent;
    /// `None` only when the cue's time does not fit the microsecond clock.
    pub fn frame_for_cue(&self, cue: &SubtitleCue, anchor_us: Option<u64>) -> Option<TelemetryFrame> {
        let offset_us = cue.start_ms.checked_mul(1000)?;
        let mut frame = match anchor_us {
            Some(anchor) => TelemetryFrame::new(anchor.checked_add(offset_us)?, FrameClock::Absolute),
            None => TelemetryFrame::new(offset_us, FrameClock::MediaRelative),
        };
        frame.media_offset_us = Some(offset_us);

        let t = self.extract(&cue.text);
        frame.sensor.lat = t.latitude.and_then(checked_latitude);
        frame.sensor.lon = t.longitude.and_then(checked_longitude);
        frame.sensor.alt_msl_m = t.abs_alt;
        frame.sensor.relative_alt_m = t.rel_alt;
        frame.sensor.true_heading_deg = t.gimbal_yaw.map(|yaw| yaw.rem_euclid(360.0));
        frame.sensor.pitch_deg = t.gimbal_pitch;
        frame.sensor.roll_deg = t.gimbal_roll;

        if let Some(focal) = t.focal_len.filter(|f| *f > 0.0) {
            frame.sensor.h_fov_deg = Some(fov_degrees(FULL_FRAME_WIDTH_MM, focal));
            frame.sensor.v_fov_deg = Some(fov_degrees(FULL_FRAME_HEIGHT_MM, focal));
        }

        Some(frame)
    }
}

impl Default for SrtParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_vtt_header(block: &str) -> bool {
    ["WEBVTT", "NOTE", "STYLE", "REGION"]
        .iter()
        .any(|kw| block.trim_start_matches('\u{feff}').starts_with(kw))
}

/// Milliseconds from an `[hours:]mm:ss,mmm` capture group run starting at `first`
fn timecode_ms(caps: &Captures<'_>, first: usize) -> Option<u64> {
    let hours: u64 = match caps.get(first) {
        Some(h) => h.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: u64 = caps[first + 1].parse().ok()?;
    let seconds: u64 = caps[first + 2].parse().ok()?;
    let millis: u64 = caps[first + 3].parse().ok()?;

    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(seconds.checked_mul(1000)?)?
        .checked_add(millis)
}

fn capture_f64(pattern: &Regex, text: &str) -> Option<f64> {
    let caps = pattern.captures(text)?;
    caps[1].trim().parse().ok().filter(|v: &f64| v.is_finite())
}

fn fov_degrees(sensor_mm: f64, focal_mm: f64) -> f64 {
    2.0 * (sensor_mm / (2.0 * focal_mm)).atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI_SRT: &str = "1\n00:00:00,000 --> 00:00:00,033\n<font size=\"28\">FrameCnt: 1, DiffTime: 33ms\n2023-04-02 10:15:30.123\n[iso: 100] [shutter: 1/1000.0] [fnum: 1.7] [ev: 0] [color_md: default] [focal_len: 24.00] [latitude: 40.712800] [longitude: -74.006000] [rel_alt: 1.300 abs_alt: 93.412] [ct: 5500] </font>\n\n2\n00:00:01,000 --> 00:00:01,033\n<font size=\"28\">FrameCnt: 2, DiffTime: 33ms\n2023-04-02 10:15:31.123\n[latitude: 40.712900] [longtitude: -74.006100] [rel_alt: 2.100 abs_alt: 94.212]</font>\n";

    #[test]
    fn test_parse_srt_block() {
        let content = r#"1
00:00:00,000 --> 00:00:01,000
<font size="28">SrtCnt : 1, DiffTime : 1000ms
2025-12-23 14:32:15.123
[iso : 100] [shutter : 1/500.0] [fnum : 280] [ev : 0]
[ct : 5500] [color_md : default] [focal_len : 24.00]
[latitude : 40.7128] [longitude : -74.0060] [altitude: 150.0]
[gb_yaw : 45.2] [gb_pitch : -15.3] [gb_roll : 0.1]</font>"#;

        let parser = SrtParser::new();
        let track = parser.parse_content(content);

        assert_eq!(track.cues.len(), 1);
        let cue = &track.cues[0];
        assert_eq!(cue.start_ms, 0);
        assert_eq!(cue.end_ms, 1000);

        let t = parser.extract(&cue.text);
        assert_eq!(t.latitude, Some(40.7128));
        assert_eq!(t.longitude, Some(-74.0060));
        assert_eq!(t.abs_alt, Some(150.0));
        assert_eq!(t.gimbal_yaw, Some(45.2));
        assert_eq!(t.gimbal_pitch, Some(-15.3));
        assert_eq!(t.gimbal_roll, Some(0.1));
        assert_eq!(t.focal_len, Some(24.0));
        assert!(t.recorded_at.is_some());
    }

    #[test]
    fn test_rel_abs_alt_and_misspelled_longitude() {
        let parser = SrtParser::new();
        let track = parser.parse_content(MINI_SRT);
        assert_eq!(track.cues.len(), 2);

        let t = parser.extract(&track.cues[1].text);
        assert_eq!(t.longitude, Some(-74.0061));
        assert_eq!(t.rel_alt, Some(2.1));
        assert_eq!(t.abs_alt, Some(94.212));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DJI_0001.SRT");
        std::fs::write(&path, MINI_SRT).unwrap();

        let track = SrtParser::new().parse_file(&path).unwrap();
        assert_eq!(track.cues.len(), 2);
        assert_eq!(track.cues[1].start_ms, 1000);

        assert!(SrtParser::new().parse_file(dir.path().join("missing.SRT")).is_err());
    }

    #[test]
    fn test_webvtt_and_crlf() {
        let content = "WEBVTT\r\n\r\n00:01.500 --> 00:02.000\r\n[latitude: 1.5] [longitude: 2.5]\r\n\r\n01:00:00.000 --> 01:00:01.000\r\n[latitude: 1.6] [longitude: 2.6]\r\n";
        let track = SrtParser::new().parse_content(content);

        assert_eq!(track.malformed_blocks, 0);
        assert_eq!(track.cues.len(), 2);
        assert_eq!(track.cues[0].start_ms, 1500);
        assert_eq!(track.cues[1].start_ms, 3_600_000);
    }

    #[test]
    fn test_malformed_block_counted() {
        let content = "1\n00:00:xx,000 --> 00:00:01,000\n[latitude: 1.0]\n\n2\n00:00:01,000 --> 00:00:02,000\n[latitude: 1.0]\n";
        let track = SrtParser::new().parse_content(content);
        assert_eq!(track.cues.len(), 1);
        assert_eq!(track.malformed_blocks, 1);
    }

    #[test]
    fn test_legacy_gps_form() {
        let t = SrtParser::new().extract("HOME(8.5,47.3) 2017.08.05 14:11:51\nGPS(8.5417,47.3769,19) BAROMETER:23.4");
        assert_eq!(t.longitude, Some(8.5417));
        assert_eq!(t.latitude, Some(47.3769));
        assert_eq!(t.abs_alt, Some(19.0));
    }

    #[test]
    fn test_epoch_anchor_from_datetime_line() {
        let parser = SrtParser::new();
        let track = parser.parse_content(MINI_SRT);
        let anchor = parser.epoch_anchor(&track.cues).unwrap();

        let expected = Utc.with_ymd_and_hms(2023, 4, 2, 10, 15, 30).unwrap().timestamp_micros() as u64 + 123_000;
        assert_eq!(anchor, expected);
    }

    #[test]
    fn test_frame_for_cue() {
        let parser = SrtParser::new();
        let cue = SubtitleCue::new(2000, 3000, "[latitude: 95.0] [longitude: 10.0] [gb_yaw: -90.0] [focal_len: 24.00]");

        let relative = parser.frame_for_cue(&cue, None).unwrap();
        assert_eq!(relative.clock, FrameClock::MediaRelative);
        assert_eq!(relative.timestamp_us, 2_000_000);
        assert_eq!(relative.media_offset_us, Some(2_000_000));
        // out-of-range latitude dropped, not clamped
        assert_eq!(relative.sensor.lat, None);
        assert_eq!(relative.sensor.lon, Some(10.0));
        assert_eq!(relative.sensor.true_heading_deg, Some(270.0));
        let hfov = relative.sensor.h_fov_deg.unwrap();
        assert!((hfov - 73.74).abs() < 0.01);

        let absolute = parser.frame_for_cue(&cue, Some(1_000_000_000)).unwrap();
        assert_eq!(absolute.clock, FrameClock::Absolute);
        assert_eq!(absolute.timestamp_us, 1_002_000_000);
    }

    #[test]
    fn test_oversized_timecode_is_malformed() {
        let content = "1\n99999999999999:00:00,000 --> 99999999999999:00:01,000\n[latitude: 1.0]\n\n2\n00:00:01,000 --> 00:00:02,000\n[latitude: 2.0]\n";
        let track = SrtParser::new().parse_content(content);

        assert_eq!(track.cues.len(), 1);
        assert_eq!(track.malformed_blocks, 1);
        assert_eq!(track.cues[0].start_ms, 1000);
    }

    #[test]
    fn test_cue_time_overflow_yields_no_frame() {
        let parser = SrtParser::new();

        let huge = SubtitleCue::new(u64::MAX / 10, u64::MAX / 10, "2023-04-02 10:15:30.000\n[latitude: 1.0]");
        assert!(parser.frame_for_cue(&huge, None).is_none());
        assert!(parser.epoch_anchor(&[huge]).is_none());

        let late = SubtitleCue::new(1000, 2000, "[latitude: 1.0]");
        assert!(parser.frame_for_cue(&late, Some(u64::MAX - 10)).is_none());
        assert!(parser.frame_for_cue(&late, Some(0)).is_some());
    }
}
