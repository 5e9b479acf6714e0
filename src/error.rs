//! Error types for telemetry decoding, correlation and export.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using the crate's call-level error.
pub type Result<T> = std::result::Result<T, GeointError>;

/// Which decode path an input was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryFormat {
    /// Binary MISB ST 0601 KLV packets.
    Klv,
    /// Consumer-drone SRT/WebVTT subtitle cues with bracketed fields.
    TextSubtitle,
}

impl fmt::Display for TelemetryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryFormat::Klv => f.write_str("klv"),
            TelemetryFormat::TextSubtitle => f.write_str("text-subtitle"),
        }
    }
}

/// Failures surfaced to the caller of a decode, correlation or export call.
#[derive(Debug, Error)]
pub enum GeointError {
    /// No recognizable Universal Key (or parseable cue) anywhere in the input.
    #[error("no telemetry found in {format} input")]
    NoTelemetryFound { format: TelemetryFormat },

    /// Configuration document could not be parsed.
    #[error("failed to parse config: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds values outside their allowed range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Rendering an export document failed.
    #[error("export failed: {0}")]
    Export(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised by the BER decoder when a length field cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed BER length")]
pub struct MalformedLength;

/// Recoverable per-packet failures. Offsets are relative to the packet start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("malformed length field at offset {offset}")]
    MalformedLength { offset: usize },

    #[error("unrecognized universal key")]
    UnrecognizedKey,

    #[error("checksum mismatch: computed {computed:#06x}, packet carries {found:?}")]
    ChecksumMismatch { computed: u16, found: Option<u16> },

    #[error("truncated buffer at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },
}
