//! Raw element bytes to physical values.

use crate::services::packet::KlvElement;
use crate::services::registry::{ByteWidth, FieldFormat, TagSpec};

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// De-scaled physical quantity in the tag's unit.
    Physical(f64),
    /// Unix epoch microseconds.
    Timestamp(u64),
    Integer(u64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Physical(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FieldDecoder;

impl FieldDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode an element against its registry entry. Returns `None` when the
    /// value has the wrong width or holds the reserved out-of-range marker.
    pub fn decode(&self, element: &KlvElement<'_>, spec: &TagSpec) -> Option<FieldValue> {
        if !spec.byte_width.accepts(element.value.len()) {
            tracing::debug!(
                tag = spec.id,
                name = spec.name,
                len = element.value.len(),
                "field has unexpected width"
            );
            return None;
        }

        match spec.format {
            FieldFormat::Timestamp => read_unsigned(element.value).map(FieldValue::Timestamp),
            FieldFormat::Integer => read_unsigned(element.value).map(FieldValue::Integer),
            FieldFormat::Text => std::str::from_utf8(element.value)
                .ok()
                .map(|s| FieldValue::Text(s.trim_end_matches('\0').to_string())),
            FieldFormat::Scaled => self.descale(element.value, spec).map(FieldValue::Physical),
        }
    }

    fn descale(&self, value: &[u8], spec: &TagSpec) -> Option<f64> {
        let (int_min, int_max) = spec.integer_range()?;
        let raw = if spec.signed {
            let raw = read_signed(value)?;
            // most negative value flags "out of range"
            if raw < int_min {
                return None;
            }
            raw
        } else {
            read_unsigned(value)? as i128
        };

        let steps = (raw - int_min) as f64;
        Some(spec.domain_min + steps * (spec.domain_max - spec.domain_min) / (int_max - int_min) as f64)
    }
}

/// Inverse of the de-scaling: the big-endian integer bytes for a physical
/// value, or `None` if the value lies outside the tag's domain.
pub fn encode_scaled(spec: &TagSpec, physical: f64) -> Option<Vec<u8>> {
    let ByteWidth::Fixed(width) = spec.byte_width else {
        return None;
    };
    if spec.format != FieldFormat::Scaled
        || !physical.is_finite()
        || physical < spec.domain_min
        || physical > spec.domain_max
    {
        return None;
    }
    let (int_min, int_max) = spec.integer_range()?;

    let ratio = (physical - spec.domain_min) / (spec.domain_max - spec.domain_min);
    let raw = (int_min as f64 + ratio * (int_max - int_min) as f64).round() as i128;
    let raw = raw.clamp(int_min, int_max);

    let bytes = (raw as i64).to_be_bytes();
    Some(bytes[8 - width..].to_vec())
}

fn read_unsigned(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

fn read_signed(bytes: &[u8]) -> Option<i128> {
    let unsigned = read_unsigned(bytes)?;
    let bits = bytes.len() as u32 * 8;
    let shift = 64 - bits;
    // sign-extend from the field width
    Some((((unsigned << shift) as i64) >> shift) as i128)
}
