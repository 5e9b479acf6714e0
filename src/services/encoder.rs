//! MISB ST 0601 packet builder.
//!
//! Produces complete packets (Universal Key, BER length, local set, checksum)
//! from physical values, using the same registry the decoder reads. Used to
//! generate synthetic telemetry and test fixtures.
//!
//! ```rust,ignore
//! let packet = PacketBuilder::new()
//!     .timestamp(1_700_000_000_000_000)
//!     .sensor_position(37.2350, -115.8111, 1500.0)
//!     .frame_center(37.2300, -115.8100)
//!     .build();
//! ```

use std::collections::BTreeMap;

use crate::services::ber::encode_ber_length;
use crate::services::field::encode_scaled;
use crate::services::packet::{checksum, UniversalKey};
use crate::services::registry::{KlvTag, TagRegistry};

#[derive(Debug, Clone)]
pub struct PacketBuilder {
    registry: &'static TagRegistry,
    /// BTreeMap keeps tags in ascending order on the wire
    tags: BTreeMap<u8, Vec<u8>>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self {
            registry: TagRegistry::st0601(),
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag with raw value bytes.
    pub fn raw(mut self, tag: u8, value: Vec<u8>) -> Self {
        self.tags.insert(tag, value);
        self
    }

    /// Add a scaled tag from its physical value. Values outside the tag's
    /// domain are left out.
    pub fn scaled(mut self, tag: KlvTag, physical: f64) -> Self {
        let id = u8::from(tag);
        match self.registry.get(id).and_then(|spec| encode_scaled(spec, physical)) {
            Some(bytes) => {
                self.tags.insert(id, bytes);
            }
            None => tracing::warn!(tag = id, physical, "value not encodable, omitting tag"),
        }
        self
    }

    /// Precision Time Stamp, Unix microseconds.
    pub fn timestamp(self, micros: u64) -> Self {
        self.raw(KlvTag::PrecisionTimeStamp.into(), micros.to_be_bytes().to_vec())
    }

    pub fn mission_id(self, id: &str) -> Self {
        self.raw(KlvTag::MissionId.into(), id.as_bytes().to_vec())
    }

    pub fn platform_designation(self, designation: &str) -> Self {
        self.raw(KlvTag::PlatformDesignation.into(), designation.as_bytes().to_vec())
    }

    pub fn version(self, version: u8) -> Self {
        self.raw(KlvTag::UasLsVersion.into(), vec![version])
    }

    /// Sensor latitude/longitude in degrees, altitude in meters MSL.
    pub fn sensor_position(self, lat: f64, lon: f64, alt: f64) -> Self {
        self.scaled(KlvTag::SensorLatitude, lat)
            .scaled(KlvTag::SensorLongitude, lon)
            .scaled(KlvTag::SensorTrueAltitude, alt)
    }

    pub fn frame_center(self, lat: f64, lon: f64) -> Self {
        self.scaled(KlvTag::FrameCenterLatitude, lat)
            .scaled(KlvTag::FrameCenterLongitude, lon)
    }

    /// Platform heading, pitch and roll in degrees.
    pub fn platform_attitude(self, heading: f64, pitch: f64, roll: f64) -> Self {
        self.scaled(KlvTag::PlatformHeadingAngle, heading)
            .scaled(KlvTag::PlatformPitchAngle, pitch)
            .scaled(KlvTag::PlatformRollAngle, roll)
    }

    pub fn field_of_view(self, horizontal: f64, vertical: f64) -> Self {
        self.scaled(KlvTag::SensorHorizontalFov, horizontal)
            .scaled(KlvTag::SensorVerticalFov, vertical)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Encode the local set without the checksum element.
    fn encode_local_set(&self) -> Vec<u8> {
        let mut local_set = Vec::new();
        for (&tag, value) in &self.tags {
            if tag == u8::from(KlvTag::Checksum) {
                continue;
            }
            local_set.push(tag);
            local_set.extend(encode_ber_length(value.len()));
            local_set.extend(value);
        }
        local_set
    }

    /// Encode a complete packet with a valid checksum.
    pub fn build(&self) -> Vec<u8> {
        let local_set = self.encode_local_set();
        // checksum element: tag, length, two value bytes
        let total_length = local_set.len() + 4;

        let mut packet = UniversalKey::UasDatalinkLocalSet.as_bytes().to_vec();
        packet.extend(encode_ber_length(total_length));
        packet.extend(local_set);
        packet.push(KlvTag::Checksum.into());
        packet.push(2);

        let sum = checksum(&packet);
        packet.extend(sum.to_be_bytes());
        packet
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::packet::PacketParser;

    #[test]
    fn test_build_starts_with_key() {
        let packet = PacketBuilder::new().timestamp(1).build();
        assert_eq!(&packet[..4], &[0x06, 0x0E, 0x2B, 0x34]);
        assert!(PacketParser::new().parse(&packet).is_ok());
    }

    #[test]
    fn test_out_of_domain_value_omitted() {
        let builder = PacketBuilder::new()
            .timestamp(1)
            .scaled(KlvTag::SensorLatitude, 123.0);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_long_form_outer_length() {
        let packet = PacketBuilder::new()
            .timestamp(1)
            .mission_id(&"M".repeat(120))
            .build();
        assert_eq!(packet[16], 0x81);
        assert!(PacketParser::new().parse(&packet).is_ok());
    }
}
