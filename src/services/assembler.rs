//! Groups decoded fields into one `TelemetryFrame` per Precision Time Stamp.

use std::collections::HashMap;

use crate::models::{checked_latitude, checked_longitude, FrameClock, TargetPoint, TelemetryFrame};
use crate::services::field::{FieldDecoder, FieldValue};
use crate::services::packet::KlvPacket;
use crate::services::registry::{KlvTag, TagRegistry};

/// Fields decoded from one or more packets sharing a timestamp.
#[derive(Debug, Clone, Default)]
struct PacketFields {
    timestamp_us: Option<u64>,
    mission_id: Option<String>,
    platform_designation: Option<String>,
    platform_heading: Option<f64>,
    platform_pitch: Option<f64>,
    platform_roll: Option<f64>,
    sensor_lat: Option<f64>,
    sensor_lon: Option<f64>,
    sensor_alt: Option<f64>,
    h_fov: Option<f64>,
    v_fov: Option<f64>,
    relative_azimuth: Option<f64>,
    relative_elevation: Option<f64>,
    relative_roll: Option<f64>,
    slant_range: Option<f64>,
    target_width: Option<f64>,
    center_lat: Option<f64>,
    center_lon: Option<f64>,
    center_elevation: Option<f64>,
}

impl PacketFields {
    fn apply(&mut self, tag: KlvTag, value: FieldValue) {
        let physical = value.as_f64();
        match (tag, value) {
            (KlvTag::PrecisionTimeStamp, FieldValue::Timestamp(ts)) => self.timestamp_us = Some(ts),
            (KlvTag::MissionId, FieldValue::Text(s)) => self.mission_id = Some(s),
            (KlvTag::PlatformDesignation, FieldValue::Text(s)) => self.platform_designation = Some(s),
            (KlvTag::PlatformHeadingAngle, _) => self.platform_heading = physical,
            (KlvTag::PlatformPitchAngle, _) => self.platform_pitch = physical,
            (KlvTag::PlatformRollAngle, _) => self.platform_roll = physical,
            (KlvTag::SensorLatitude, _) => self.sensor_lat = physical,
            (KlvTag::SensorLongitude, _) => self.sensor_lon = physical,
            (KlvTag::SensorTrueAltitude, _) => self.sensor_alt = physical,
            (KlvTag::SensorHorizontalFov, _) => self.h_fov = physical,
            (KlvTag::SensorVerticalFov, _) => self.v_fov = physical,
            (KlvTag::SensorRelativeAzimuth, _) => self.relative_azimuth = physical,
            (KlvTag::SensorRelativeElevation, _) => self.relative_elevation = physical,
            (KlvTag::SensorRelativeRoll, _) => self.relative_roll = physical,
            (KlvTag::SlantRange, _) => self.slant_range = physical,
            (KlvTag::TargetWidth, _) => self.target_width = physical,
            (KlvTag::FrameCenterLatitude, _) => self.center_lat = physical,
            (KlvTag::FrameCenterLongitude, _) => self.center_lon = physical,
            (KlvTag::FrameCenterElevation, _) => self.center_elevation = physical,
            _ => {}
        }
    }

    /// Fill fields this packet lacks from a later packet with the same timestamp.
    fn merge(&mut self, other: PacketFields) {
        self.mission_id = self.mission_id.take().or(other.mission_id);
        self.platform_designation = self.platform_designation.take().or(other.platform_designation);
        self.platform_heading = self.platform_heading.or(other.platform_heading);
        self.platform_pitch = self.platform_pitch.or(other.platform_pitch);
        self.platform_roll = self.platform_roll.or(other.platform_roll);
        self.sensor_lat = self.sensor_lat.or(other.sensor_lat);
        self.sensor_lon = self.sensor_lon.or(other.sensor_lon);
        self.sensor_alt = self.sensor_alt.or(other.sensor_alt);
        self.h_fov = self.h_fov.or(other.h_fov);
        self.v_fov = self.v_fov.or(other.v_fov);
        self.relative_azimuth = self.relative_azimuth.or(other.relative_azimuth);
        self.relative_elevation = self.relative_elevation.or(other.relative_elevation);
        self.relative_roll = self.relative_roll.or(other.relative_roll);
        self.slant_range = self.slant_range.or(other.slant_range);
        self.target_width = self.target_width.or(other.target_width);
        self.center_lat = self.center_lat.or(other.center_lat);
        self.center_lon = self.center_lon.or(other.center_lon);
        self.center_elevation = self.center_elevation.or(other.center_elevation);
    }

    fn into_frame(self, timestamp_us: u64) -> TelemetryFrame {
        let mut frame = TelemetryFrame::new(timestamp_us, FrameClock::Absolute);

        frame.sensor.lat = self.sensor_lat.and_then(|v| checked_coordinate(v, checked_latitude, timestamp_us));
        frame.sensor.lon = self.sensor_lon.and_then(|v| checked_coordinate(v, checked_longitude, timestamp_us));
        frame.sensor.alt_msl_m = self.sensor_alt;
        frame.sensor.true_heading_deg = match (self.platform_heading, self.relative_azimuth) {
            (Some(heading), Some(azimuth)) => Some((heading + azimuth) % 360.0),
            (heading, _) => heading,
        };
        frame.sensor.pitch_deg = self.platform_pitch;
        frame.sensor.roll_deg = self.platform_roll;
        frame.sensor.h_fov_deg = self.h_fov;
        frame.sensor.v_fov_deg = self.v_fov;

        let center_lat = self.center_lat.and_then(|v| checked_coordinate(v, checked_latitude, timestamp_us));
        let center_lon = self.center_lon.and_then(|v| checked_coordinate(v, checked_longitude, timestamp_us));
        if let (Some(lat), Some(lon)) = (center_lat, center_lon) {
            frame.target = Some(TargetPoint {
                lat,
                lon,
                elevation_m: self.center_elevation,
            });
        }

        frame.look.relative_azimuth_deg = self.relative_azimuth;
        frame.look.relative_elevation_deg = self.relative_elevation;
        frame.look.relative_roll_deg = self.relative_roll;
        frame.look.slant_range_m = self.slant_range;
        frame.look.target_width_m = self.target_width;

        frame.mission_id = self.mission_id;
        frame.platform_designation = self.platform_designation;
        frame
    }
}

fn checked_coordinate(value: f64, check: fn(f64) -> Option<f64>, timestamp_us: u64) -> Option<f64> {
    let checked = check(value);
    if checked.is_none() {
        tracing::warn!(timestamp_us, value, "coordinate out of range, treating as absent");
    }
    checked
}

/// Accumulates packets of one stream into frames.
pub struct FrameAssembler<'r> {
    registry: &'r TagRegistry,
    decoder: FieldDecoder,
    pending: Vec<PacketFields>,
    by_timestamp: HashMap<u64, usize>,
    missing_timestamp: usize,
}

impl<'r> FrameAssembler<'r> {
    pub fn new(registry: &'r TagRegistry) -> Self {
        Self {
            registry,
            decoder: FieldDecoder::new(),
            pending: Vec::new(),
            by_timestamp: HashMap::new(),
            missing_timestamp: 0,
        }
    }

    /// Decode a packet's elements and file them under its timestamp.
    /// Returns `false` if the packet had no usable Precision Time Stamp.
    pub fn push_packet(&mut self, packet: &KlvPacket<'_>) -> bool {
        let mut fields = PacketFields::default();
        for element in &packet.elements {
            // tags without a registry entry are skipped
            let Some(spec) = self.registry.get(element.tag) else {
                continue;
            };
            if let Some(value) = self.decoder.decode(element, spec) {
                fields.apply(KlvTag::from(element.tag), value);
            }
        }

        let Some(timestamp_us) = fields.timestamp_us else {
            self.missing_timestamp += 1;
            return false;
        };

        match self.by_timestamp.get(&timestamp_us) {
            Some(&index) => self.pending[index].merge(fields),
            None => {
                self.by_timestamp.insert(timestamp_us, self.pending.len());
                self.pending.push(fields);
            }
        }
        true
    }

    /// Packets dropped for lacking a timestamp.
    pub fn missing_timestamp(&self) -> usize {
        self.missing_timestamp
    }

    pub fn frame_count(&self) -> usize {
        self.pending.len()
    }

    /// Freeze the collected frames, in arrival order.
    pub fn finish(self) -> Vec<TelemetryFrame> {
        self.pending
            .into_iter()
            .filter_map(|fields| {
                let timestamp_us = fields.timestamp_us?;
                Some(fields.into_frame(timestamp_us))
            })
            .collect()
    }
}
