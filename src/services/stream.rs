//! Whole-stream telemetry decoding.
//!
//! The input is sniffed once and routed to one of the two strategies of
//! [`TelemetryFormat`]: binary KLV packets or drone subtitle cues. Individual
//! bad packets or cues are counted and skipped; only the absence of any
//! recognizable telemetry fails the call.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::DecodeConfig;
use crate::error::{GeointError, PacketError, Result, TelemetryFormat};
use crate::models::{SubtitleCue, TelemetryFrame};
use crate::services::assembler::FrameAssembler;
use crate::services::packet::{PacketParser, SMPTE_PREFIX};
use crate::services::registry::TagRegistry;
use crate::services::srt_parser::SrtParser;

/// Input handed over by the container demuxer.
#[derive(Debug, Clone, Copy)]
pub enum TelemetryInput<'a> {
    /// Raw demuxed bytes: a KLV data stream or a subtitle document.
    Bytes(&'a [u8]),
    /// Subtitle cues already split by the demuxer.
    Cues(&'a [SubtitleCue]),
}

/// Per-cause counts of packets or cues that were skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeFailures {
    pub unrecognized_key: usize,
    pub malformed_length: usize,
    pub checksum_mismatch: usize,
    pub truncated: usize,
    /// Structurally valid packets without a Precision Time Stamp
    pub missing_timestamp: usize,
    pub malformed_cues: usize,
}

impl DecodeFailures {
    fn record(&mut self, error: &PacketError) {
        match error {
            PacketError::UnrecognizedKey => self.unrecognized_key += 1,
            PacketError::MalformedLength { .. } => self.malformed_length += 1,
            PacketError::ChecksumMismatch { .. } => self.checksum_mismatch += 1,
            PacketError::TruncatedBuffer { .. } => self.truncated += 1,
        }
    }

    /// Packets that failed checksum validation or structural parsing.
    pub fn failed_packets(&self) -> usize {
        self.unrecognized_key + self.malformed_length + self.checksum_mismatch + self.truncated
    }

    pub fn total(&self) -> usize {
        self.failed_packets() + self.missing_timestamp + self.malformed_cues
    }
}

/// Output of one decode call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDecodeResult {
    pub format: TelemetryFormat,
    pub frames: Vec<TelemetryFrame>,
    pub failures: DecodeFailures,
}

/// Pick the decode strategy for a raw byte buffer.
pub fn sniff_format(data: &[u8]) -> TelemetryFormat {
    if find_subslice(data, &SMPTE_PREFIX, 0).is_some() {
        return TelemetryFormat::Klv;
    }
    match std::str::from_utf8(data) {
        Ok(text) if text.contains("-->") => TelemetryFormat::TextSubtitle,
        _ => TelemetryFormat::Klv,
    }
}

pub struct StreamDecoder<'r> {
    registry: &'r TagRegistry,
    parser: PacketParser,
    srt: SrtParser,
    config: DecodeConfig,
}

impl<'r> StreamDecoder<'r> {
    pub fn new(registry: &'r TagRegistry, config: DecodeConfig) -> Self {
        Self {
            registry,
            parser: PacketParser::new(),
            srt: SrtParser::new(),
            config,
        }
    }

    pub fn decode(&self, input: TelemetryInput<'_>) -> Result<StreamDecodeResult> {
        match input {
            TelemetryInput::Bytes(data) => match sniff_format(data) {
                TelemetryFormat::Klv => self.decode_klv(data),
                TelemetryFormat::TextSubtitle => {
                    // sniffing only picks this path for valid UTF-8
                    let text = String::from_utf8_lossy(data);
                    self.decode_subtitles(&text)
                }
            },
            TelemetryInput::Cues(cues) => self.decode_cues(cues, 0),
        }
    }

    /// Decode a demuxed KLV byte stream.
    pub fn decode_klv(&self, data: &[u8]) -> Result<StreamDecodeResult> {
        let mut assembler = FrameAssembler::new(self.registry);
        let mut failures = DecodeFailures::default();
        let mut found_key = false;
        let mut pos = 0;

        while let Some(start) = find_subslice(data, &SMPTE_PREFIX, pos) {
            match self.parser.parse(&data[start..]) {
                Ok(packet) => {
                    found_key = true;
                    assembler.push_packet(&packet);
                    pos = start + packet.len;
                }
                Err(error) => {
                    failures.record(&error);
                    tracing::debug!(offset = start, %error, "skipping KLV packet");
                    // resume at the next key candidate; a failed packet's own
                    // length is not trusted to skip ahead
                    match error {
                        PacketError::UnrecognizedKey => {}
                        PacketError::ChecksumMismatch { .. } | PacketError::MalformedLength { .. } => {
                            found_key = true;
                        }
                        PacketError::TruncatedBuffer { offset, .. } => {
                            // offset 0 means the key itself was cut short
                            found_key |= offset > 0;
                        }
                    }
                    pos = start + 1;
                }
            }
        }

        if !found_key {
            return Err(GeointError::NoTelemetryFound {
                format: TelemetryFormat::Klv,
            });
        }

        failures.missing_timestamp = assembler.missing_timestamp();
        let mut frames = assembler.finish();
        if self.config.sort_frames {
            frames.sort_by_key(|f| f.timestamp_us);
        }

        self.log_summary(TelemetryFormat::Klv, frames.len(), &failures);
        Ok(StreamDecodeResult {
            format: TelemetryFormat::Klv,
            frames,
            failures,
        })
    }

    /// Decode an SRT/WebVTT document from a consumer drone.
    pub fn decode_subtitles(&self, content: &str) -> Result<StreamDecodeResult> {
        let track = self.srt.parse_content(content);
        self.decode_cues(&track.cues, track.malformed_blocks)
    }

    fn decode_cues(&self, cues: &[SubtitleCue], malformed_blocks: usize) -> Result<StreamDecodeResult> {
        if cues.is_empty() {
            return Err(GeointError::NoTelemetryFound {
                format: TelemetryFormat::TextSubtitle,
            });
        }

        let anchor = self.config.epoch_anchor_us.or_else(|| self.srt.epoch_anchor(cues));
        if anchor.is_none() {
            tracing::debug!("no epoch anchor for subtitle telemetry, frames stay media-relative");
        }

        let mut seen = HashSet::new();
        let mut unusable = 0;
        let mut frames: Vec<TelemetryFrame> = Vec::with_capacity(cues.len());
        for cue in cues {
            let Some(frame) = self.srt.frame_for_cue(cue, anchor) else {
                tracing::debug!(start_ms = cue.start_ms, "cue time out of range, skipping");
                unusable += 1;
                continue;
            };
            // first cue wins when two start at the same instant
            if seen.insert(frame.timestamp_us) {
                frames.push(frame);
            }
        }
        if frames.is_empty() {
            return Err(GeointError::NoTelemetryFound {
                format: TelemetryFormat::TextSubtitle,
            });
        }
        if self.config.sort_frames {
            frames.sort_by_key(|f| f.timestamp_us);
        }

        let failures = DecodeFailures {
            malformed_cues: malformed_blocks + unusable,
            ..Default::default()
        };
        self.log_summary(TelemetryFormat::TextSubtitle, frames.len(), &failures);
        Ok(StreamDecodeResult {
            format: TelemetryFormat::TextSubtitle,
            frames,
            failures,
        })
    }

    fn log_summary(&self, format: TelemetryFormat, frames: usize, failures: &DecodeFailures) {
        if failures.total() > 0 {
            tracing::warn!(
                %format,
                frames,
                failed_packets = failures.failed_packets(),
                missing_timestamp = failures.missing_timestamp,
                malformed_cues = failures.malformed_cues,
                "telemetry decoded with failures"
            );
        } else {
            tracing::info!(%format, frames, "telemetry decoded");
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrameClock;
    use crate::services::encoder::PacketBuilder;

    fn decoder() -> StreamDecoder<'static> {
        StreamDecoder::new(TagRegistry::st0601(), DecodeConfig::default())
    }

    fn packet(ts: u64) -> Vec<u8> {
        PacketBuilder::new()
            .timestamp(ts)
            .sensor_position(35.0, 139.0, 500.0)
            .build()
    }

    /// Deterministic garbage that never contains the SMPTE designator byte.
    fn garbage(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_F491;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                match (state >> 24) as u8 {
                    0x06 => 0x07,
                    b => b,
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_input_is_no_telemetry() {
        let err = decoder().decode(TelemetryInput::Bytes(&[])).unwrap_err();
        assert!(matches!(
            err,
            GeointError::NoTelemetryFound {
                format: TelemetryFormat::Klv
            }
        ));
    }

    #[test]
    fn test_garbage_only_is_no_telemetry() {
        let err = decoder().decode_klv(&garbage(500)).unwrap_err();
        assert!(matches!(err, GeointError::NoTelemetryFound { .. }));
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut data = packet(1_000_000);
        data.extend(garbage(50));
        data.extend(packet(2_000_000));

        let result = decoder().decode_klv(&data).unwrap();
        assert_eq!(result.format, TelemetryFormat::Klv);
        assert_eq!(result.frames.len(), 2);
        assert_eq!(result.failures.total(), 0);
    }

    /// Unfiltered xorshift bytes; may contain any byte value.
    fn noise(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn test_resync_after_unfiltered_noise() {
        for seed in [0x2545_F491u32, 0x9E37_79B9, 0x0606_0606] {
            let mut data = packet(1_000_000);
            data.extend(noise(50, seed));
            data.extend(packet(2_000_000));

            let result = decoder().decode_klv(&data).unwrap();
            assert_eq!(result.frames.len(), 2, "seed {seed:#x}");
        }
    }

    #[test]
    fn test_stray_prefix_right_before_key() {
        let mut data = packet(1_000_000);
        data.extend([0x11, 0x22]);
        data.extend(SMPTE_PREFIX);
        data.extend(packet(2_000_000));

        let result = decoder().decode_klv(&data).unwrap();
        let stamps: Vec<u64> = result.frames.iter().map(|f| f.timestamp_us).collect();
        assert_eq!(stamps, vec![1_000_000, 2_000_000]);
        assert_eq!(result.failures.unrecognized_key, 1);
    }

    #[test]
    fn test_partial_prefixes_in_garbage() {
        let mut data = packet(1_000_000);
        data.extend(garbage(40));
        data.extend([0x06, 0x0E, 0x2B, 0x06, 0x0E, 0x06]);
        data.extend(SMPTE_PREFIX);
        data.extend([0x06, 0x0E]);
        data.extend(packet(2_000_000));

        let result = decoder().decode_klv(&data).unwrap();
        assert_eq!(result.frames.len(), 2);
    }

    #[test]
    fn test_inflated_length_does_not_swallow_next_packet() {
        let mut a = packet(1_000_000);
        // short-form outer length follows the key
        a[16] += 16;
        let mut data = a;
        data.extend(packet(2_000_000));
        data.extend(packet(3_000_000));

        let result = decoder().decode_klv(&data).unwrap();
        let stamps: Vec<u64> = result.frames.iter().map(|f| f.timestamp_us).collect();
        assert_eq!(stamps, vec![2_000_000, 3_000_000]);
        assert_eq!(result.failures.failed_packets(), 1);
    }

    #[test]
    fn test_cue_with_unrepresentable_time_is_counted() {
        let cues = vec![
            SubtitleCue::new(u64::MAX / 10, u64::MAX / 10, "[latitude: 1.0]"),
            SubtitleCue::new(1000, 2000, "[latitude: 2.0]"),
        ];
        let result = decoder().decode(TelemetryInput::Cues(&cues)).unwrap();
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.failures.malformed_cues, 1);

        let err = decoder().decode(TelemetryInput::Cues(&cues[..1])).unwrap_err();
        assert!(matches!(err, GeointError::NoTelemetryFound { .. }));
    }

    #[test]
    fn test_oversized_subtitle_timecode_does_not_panic() {
        let srt = "1\n99999999999999:00:00,000 --> 99999999999999:00:01,000\n[latitude: 1.0]\n\n2\n00:00:01,000 --> 00:00:02,000\n[latitude: 2.0]\n";
        let result = decoder().decode(TelemetryInput::Bytes(srt.as_bytes())).unwrap();
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.failures.malformed_cues, 1);
    }

    #[test]
    fn test_checksum_failure_discards_packet() {
        let good = packet(1_000_000);
        let mut bad = packet(2_000_000);
        let last = bad.len() - 1;
        bad[last] = bad[last].wrapping_add(1);

        let mut data = good.clone();
        data.extend(&bad);
        data.extend(packet(3_000_000));

        let result = decoder().decode_klv(&data).unwrap();
        let stamps: Vec<u64> = result.frames.iter().map(|f| f.timestamp_us).collect();
        assert_eq!(stamps, vec![1_000_000, 3_000_000]);
        assert_eq!(result.failures.checksum_mismatch, 1);
    }

    #[test]
    fn test_all_packets_corrupt_is_not_no_telemetry() {
        let mut bad = packet(1);
        let last = bad.len() - 1;
        bad[last] ^= 0x55;

        let result = decoder().decode_klv(&bad).unwrap();
        assert!(result.frames.is_empty());
        assert_eq!(result.failures.failed_packets(), 1);
    }

    #[test]
    fn test_truncated_tail_packet() {
        let mut data = packet(1_000_000);
        let second = packet(2_000_000);
        data.extend(&second[..second.len() - 3]);

        let result = decoder().decode_klv(&data).unwrap();
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.failures.truncated, 1);
    }

    #[test]
    fn test_frame_count_matches_distinct_timestamps() {
        let stamps = [5_000_000u64, 1_000_000, 3_000_000, 3_000_000, 2_000_000];
        let data: Vec<u8> = stamps.iter().flat_map(|&ts| packet(ts)).collect();

        let result = decoder().decode_klv(&data).unwrap();
        let decoded: Vec<u64> = result.frames.iter().map(|f| f.timestamp_us).collect();
        assert_eq!(decoded, vec![1_000_000, 2_000_000, 3_000_000, 5_000_000]);
    }

    #[test]
    fn test_unsorted_when_requested() {
        let config = DecodeConfig {
            sort_frames: false,
            ..Default::default()
        };
        let data: Vec<u8> = [3u64, 1, 2].iter().flat_map(|&ts| packet(ts)).collect();
        let result = StreamDecoder::new(TagRegistry::st0601(), config).decode_klv(&data).unwrap();
        let decoded: Vec<u64> = result.frames.iter().map(|f| f.timestamp_us).collect();
        assert_eq!(decoded, vec![3, 1, 2]);
    }

    #[test]
    fn test_foreign_universal_key_skipped() {
        let mut foreign = packet(9);
        foreign[12] = 0x02;
        let mut data = foreign;
        data.extend(packet(10));

        let result = decoder().decode_klv(&data).unwrap();
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.failures.unrecognized_key, 1);
    }

    #[test]
    fn test_sniff_subtitle_bytes() {
        let srt = b"1\n00:00:00,000 --> 00:00:01,000\n[latitude: 10.0] [longitude: 20.0]\n";
        assert_eq!(sniff_format(srt), TelemetryFormat::TextSubtitle);
        assert_eq!(sniff_format(&packet(1)), TelemetryFormat::Klv);

        let result = decoder().decode(TelemetryInput::Bytes(srt)).unwrap();
        assert_eq!(result.format, TelemetryFormat::TextSubtitle);
        assert_eq!(result.frames[0].clock, FrameClock::MediaRelative);
        assert_eq!(result.frames[0].sensor.lat, Some(10.0));
    }

    #[test]
    fn test_cues_with_configured_anchor() {
        let config = DecodeConfig {
            epoch_anchor_us: Some(1_600_000_000_000_000),
            ..Default::default()
        };
        let cues = vec![
            SubtitleCue::new(1000, 2000, "[latitude: 1.0] [longitude: 2.0]"),
            SubtitleCue::new(0, 1000, "garbled"),
        ];
        let result = StreamDecoder::new(TagRegistry::st0601(), config)
            .decode(TelemetryInput::Cues(&cues))
            .unwrap();

        assert_eq!(result.frames.len(), 2);
        assert_eq!(result.frames[0].timestamp_us, 1_600_000_000_000_000);
        assert_eq!(result.frames[0].sensor.lat, None);
        assert_eq!(result.frames[1].clock, FrameClock::Absolute);
    }

    #[test]
    fn test_no_cues_is_no_telemetry() {
        let err = decoder().decode(TelemetryInput::Cues(&[])).unwrap_err();
        assert!(matches!(
            err,
            GeointError::NoTelemetryFound {
                format: TelemetryFormat::TextSubtitle
            }
        ));
    }
}
