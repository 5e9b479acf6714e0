//! Parser for a single MISB ST 0601 packet.
//!
//! Layout: `[16-byte Universal Key] [BER length] [local set ... checksum]`,
//! where each local set element is `[1-byte tag] [BER length] [value]` and the
//! final element is the two-byte checksum (tag 1).

use crate::error::PacketError;
use crate::services::ber::decode_ber_length;
use crate::services::registry::KlvTag;

/// Length of a SMPTE 336M Universal Key.
pub const KEY_LEN: usize = 16;

/// SMPTE designator every Universal Key starts with; used to resynchronize.
pub const SMPTE_PREFIX: [u8; 4] = [0x06, 0x0E, 0x2B, 0x34];

const UAS_DATALINK_LS_KEY: [u8; KEY_LEN] = [
    0x06, 0x0E, 0x2B, 0x34, // SMPTE designator
    0x02, 0x0B, 0x01, 0x01, // Registry category + designation
    0x0E, 0x01, 0x03, 0x01, // Organization (MISB)
    0x01, 0x00, 0x00, 0x00, // ST 0601 Local Set
];

/// Universal Keys accepted as telemetry packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniversalKey {
    /// MISB ST 0601 UAS Datalink Local Set.
    UasDatalinkLocalSet,
}

impl UniversalKey {
    pub fn as_bytes(&self) -> &'static [u8; KEY_LEN] {
        match self {
            UniversalKey::UasDatalinkLocalSet => &UAS_DATALINK_LS_KEY,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes == UAS_DATALINK_LS_KEY).then_some(UniversalKey::UasDatalinkLocalSet)
    }
}

/// One local set element, borrowing its value from the packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KlvElement<'a> {
    pub tag: u8,
    pub length: usize,
    pub value: &'a [u8],
    /// Offset of the tag byte from the start of the packet
    pub offset: usize,
}

/// A checksum-verified packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlvPacket<'a> {
    pub key: UniversalKey,
    /// Local set elements in wire order, checksum excluded
    pub elements: Vec<KlvElement<'a>>,
    pub checksum: u16,
    /// Bytes occupied by the packet, key through checksum
    pub len: usize,
}

/// MISB ST 0601 running 16-bit checksum: bytes summed as big-endian 16-bit
/// words, so even offsets land in the high byte. Not a plain byte sum; a
/// byte-sum check rejects every conforming packet.
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().enumerate().fold(0u16, |sum, (i, &byte)| {
        sum.wrapping_add((byte as u16) << (8 * ((i + 1) % 2)))
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PacketParser;

impl PacketParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the packet starting at `buf[0]`. Trailing bytes after the
    /// packet are ignored; `KlvPacket::len` says where it ended.
    pub fn parse<'a>(&self, buf: &'a [u8]) -> Result<KlvPacket<'a>, PacketError> {
        let key_bytes = buf.get(..KEY_LEN).ok_or(PacketError::TruncatedBuffer {
            offset: 0,
            needed: KEY_LEN,
            available: buf.len(),
        })?;
        let key = UniversalKey::from_bytes(key_bytes).ok_or(PacketError::UnrecognizedKey)?;

        let (length, len_bytes) = decode_ber_length(&buf[KEY_LEN..])
            .map_err(|_| PacketError::MalformedLength { offset: KEY_LEN })?;
        let value_start = KEY_LEN + len_bytes;
        let end = value_start
            .checked_add(length)
            .ok_or(PacketError::MalformedLength { offset: KEY_LEN })?;
        if end > buf.len() {
            return Err(PacketError::TruncatedBuffer {
                offset: value_start,
                needed: length,
                available: buf.len() - value_start,
            });
        }

        let mut elements = self.parse_local_set(buf, value_start, end)?;

        let carried = match elements.pop() {
            Some(e) if e.tag == u8::from(KlvTag::Checksum) && e.length == 2 => {
                Some(u16::from_be_bytes([e.value[0], e.value[1]]))
            }
            _ => None,
        };
        let computed = checksum(&buf[..end.saturating_sub(2)]);
        if carried != Some(computed) {
            return Err(PacketError::ChecksumMismatch {
                computed,
                found: carried,
            });
        }

        Ok(KlvPacket {
            key,
            elements,
            checksum: computed,
            len: end,
        })
    }

    fn parse_local_set<'a>(
        &self,
        buf: &'a [u8],
        start: usize,
        end: usize,
    ) -> Result<Vec<KlvElement<'a>>, PacketError> {
        let mut elements = Vec::new();
        let mut pos = start;

        while pos < end {
            let tag = buf[pos];
            let (length, len_bytes) = decode_ber_length(&buf[pos + 1..end])
                .map_err(|_| PacketError::MalformedLength { offset: pos + 1 })?;
            let value_start = pos + 1 + len_bytes;
            let value_end = value_start
                .checked_add(length)
                .filter(|&e| e <= end)
                .ok_or(PacketError::TruncatedBuffer {
                    offset: value_start,
                    needed: length,
                    available: end - value_start,
                })?;

            elements.push(KlvElement {
                tag,
                length,
                value: &buf[value_start..value_end],
                offset: pos,
            });
            pos = value_end;
        }

        Ok(elements)
    }
}
