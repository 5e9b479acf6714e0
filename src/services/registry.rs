//! MISB ST 0601 UAS Datalink Local Set tag table.
//!
//! The registry is an immutable map built once per process and handed to the
//! decoders by reference, so concurrent decodes share no mutable state.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Physical unit of a decoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Degrees,
    Meters,
    Radians,
    Microseconds,
    Unitless,
}

/// How a tag's value bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// Fixed-width integer linearly mapped onto `[domain_min, domain_max]`.
    Scaled,
    /// Unsigned 64-bit Unix microseconds, taken as-is.
    Timestamp,
    /// Unsigned integer taken as-is.
    Integer,
    /// UTF-8 text.
    Text,
}

/// Expected encoded width of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteWidth {
    Fixed(usize),
    Variable { max: usize },
}

impl ByteWidth {
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            ByteWidth::Fixed(n) => len == n,
            ByteWidth::Variable { max } => len <= max,
        }
    }
}

/// Decode rule for one local set tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagSpec {
    pub id: u8,
    pub name: &'static str,
    pub byte_width: ByteWidth,
    pub signed: bool,
    pub domain_min: f64,
    pub domain_max: f64,
    pub unit: Unit,
    pub format: FieldFormat,
}

impl TagSpec {
    const fn scaled(
        id: u8,
        name: &'static str,
        width: usize,
        signed: bool,
        domain_min: f64,
        domain_max: f64,
        unit: Unit,
    ) -> Self {
        Self {
            id,
            name,
            byte_width: ByteWidth::Fixed(width),
            signed,
            domain_min,
            domain_max,
            unit,
            format: FieldFormat::Scaled,
        }
    }

    const fn text(id: u8, name: &'static str, max: usize) -> Self {
        Self {
            id,
            name,
            byte_width: ByteWidth::Variable { max },
            signed: false,
            domain_min: 0.0,
            domain_max: 0.0,
            unit: Unit::Unitless,
            format: FieldFormat::Text,
        }
    }

    /// Integer range `[int_min, int_max]` a scaled field maps onto its domain.
    ///
    /// Signed fields use the symmetric range; the most negative value is the
    /// reserved "out of range" indicator.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let ByteWidth::Fixed(width) = self.byte_width else {
            return None;
        };
        if width == 0 || width > 8 {
            return None;
        }
        let bits = (width * 8) as u32;
        if self.signed {
            let max = (1i128 << (bits - 1)) - 1;
            Some((-max, max))
        } else {
            Some((0, (1i128 << bits) - 1))
        }
    }
}

/// Local set tag identifiers this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KlvTag {
    Checksum,
    PrecisionTimeStamp,
    MissionId,
    PlatformHeadingAngle,
    PlatformPitchAngle,
    PlatformRollAngle,
    PlatformDesignation,
    SensorLatitude,
    SensorLongitude,
    SensorTrueAltitude,
    SensorHorizontalFov,
    SensorVerticalFov,
    SensorRelativeAzimuth,
    SensorRelativeElevation,
    SensorRelativeRoll,
    SlantRange,
    TargetWidth,
    FrameCenterLatitude,
    FrameCenterLongitude,
    FrameCenterElevation,
    UasLsVersion,
    Other(u8),
}

impl From<u8> for KlvTag {
    fn from(v: u8) -> Self {
        match v {
            1 => KlvTag::Checksum,
            2 => KlvTag::PrecisionTimeStamp,
            3 => KlvTag::MissionId,
            5 => KlvTag::PlatformHeadingAngle,
            6 => KlvTag::PlatformPitchAngle,
            7 => KlvTag::PlatformRollAngle,
            10 => KlvTag::PlatformDesignation,
            13 => KlvTag::SensorLatitude,
            14 => KlvTag::SensorLongitude,
            15 => KlvTag::SensorTrueAltitude,
            16 => KlvTag::SensorHorizontalFov,
            17 => KlvTag::SensorVerticalFov,
            18 => KlvTag::SensorRelativeAzimuth,
            19 => KlvTag::SensorRelativeElevation,
            20 => KlvTag::SensorRelativeRoll,
            21 => KlvTag::SlantRange,
            22 => KlvTag::TargetWidth,
            23 => KlvTag::FrameCenterLatitude,
            24 => KlvTag::FrameCenterLongitude,
            25 => KlvTag::FrameCenterElevation,
            65 => KlvTag::UasLsVersion,
            v => KlvTag::Other(v),
        }
    }
}

impl From<KlvTag> for u8 {
    fn from(tag: KlvTag) -> u8 {
        match tag {
            KlvTag::Checksum => 1,
            KlvTag::PrecisionTimeStamp => 2,
            KlvTag::MissionId => 3,
            KlvTag::PlatformHeadingAngle => 5,
            KlvTag::PlatformPitchAngle => 6,
            KlvTag::PlatformRollAngle => 7,
            KlvTag::PlatformDesignation => 10,
            KlvTag::SensorLatitude => 13,
            KlvTag::SensorLongitude => 14,
            KlvTag::SensorTrueAltitude => 15,
            KlvTag::SensorHorizontalFov => 16,
            KlvTag::SensorVerticalFov => 17,
            KlvTag::SensorRelativeAzimuth => 18,
            KlvTag::SensorRelativeElevation => 19,
            KlvTag::SensorRelativeRoll => 20,
            KlvTag::SlantRange => 21,
            KlvTag::TargetWidth => 22,
            KlvTag::FrameCenterLatitude => 23,
            KlvTag::FrameCenterLongitude => 24,
            KlvTag::FrameCenterElevation => 25,
            KlvTag::UasLsVersion => 65,
            KlvTag::Other(v) => v,
        }
    }
}

const ST0601_TAGS: &[TagSpec] = &[
    TagSpec {
        id: 1,
        name: "Checksum",
        byte_width: ByteWidth::Fixed(2),
        signed: false,
        domain_min: 0.0,
        domain_max: 65535.0,
        unit: Unit::Unitless,
        format: FieldFormat::Integer,
    },
    TagSpec {
        id: 2,
        name: "Precision Time Stamp",
        byte_width: ByteWidth::Fixed(8),
        signed: false,
        domain_min: 0.0,
        domain_max: 0.0,
        unit: Unit::Microseconds,
        format: FieldFormat::Timestamp,
    },
    TagSpec::text(3, "Mission ID", 127),
    TagSpec::scaled(5, "Platform Heading Angle", 2, false, 0.0, 360.0, Unit::Degrees),
    TagSpec::scaled(6, "Platform Pitch Angle", 2, true, -20.0, 20.0, Unit::Degrees),
    TagSpec::scaled(7, "Platform Roll Angle", 2, true, -50.0, 50.0, Unit::Degrees),
    TagSpec::text(10, "Platform Designation", 127),
    TagSpec::scaled(13, "Sensor Latitude", 4, true, -90.0, 90.0, Unit::Degrees),
    TagSpec::scaled(14, "Sensor Longitude", 4, true, -180.0, 180.0, Unit::Degrees),
    TagSpec::scaled(15, "Sensor True Altitude", 2, false, -900.0, 19000.0, Unit::Meters),
    TagSpec::scaled(16, "Sensor Horizontal Field of View", 2, false, 0.0, 180.0, Unit::Degrees),
    TagSpec::scaled(17, "Sensor Vertical Field of View", 2, false, 0.0, 180.0, Unit::Degrees),
    TagSpec::scaled(18, "Sensor Relative Azimuth Angle", 4, false, 0.0, 360.0, Unit::Degrees),
    TagSpec::scaled(19, "Sensor Relative Elevation Angle", 4, true, -180.0, 180.0, Unit::Degrees),
    TagSpec::scaled(20, "Sensor Relative Roll Angle", 4, false, 0.0, 360.0, Unit::Degrees),
    TagSpec::scaled(21, "Slant Range", 4, false, 0.0, 5_000_000.0, Unit::Meters),
    TagSpec::scaled(22, "Target Width", 2, false, 0.0, 10_000.0, Unit::Meters),
    TagSpec::scaled(23, "Frame Center Latitude", 4, true, -90.0, 90.0, Unit::Degrees),
    TagSpec::scaled(24, "Frame Center Longitude", 4, true, -180.0, 180.0, Unit::Degrees),
    TagSpec::scaled(25, "Frame Center Elevation", 2, false, -900.0, 19000.0, Unit::Meters),
    TagSpec {
        id: 65,
        name: "UAS Datalink LS Version Number",
        byte_width: ByteWidth::Fixed(1),
        signed: false,
        domain_min: 0.0,
        domain_max: 255.0,
        unit: Unit::Unitless,
        format: FieldFormat::Integer,
    },
];

/// Immutable tag-id to decode-rule map.
#[derive(Debug, Clone)]
pub struct TagRegistry {
    specs: HashMap<u8, TagSpec>,
}

impl TagRegistry {
    pub fn from_specs(specs: &[TagSpec]) -> Self {
        Self {
            specs: specs.iter().map(|s| (s.id, *s)).collect(),
        }
    }

    /// The process-wide MISB ST 0601 registry.
    pub fn st0601() -> &'static TagRegistry {
        static REGISTRY: OnceLock<TagRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| TagRegistry::from_specs(ST0601_TAGS))
    }

    pub fn get(&self, id: u8) -> Option<&TagSpec> {
        self.specs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagSpec> {
        self.specs.values()
    }
}
