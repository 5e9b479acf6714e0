pub mod assembler;
pub mod ber;
pub mod correlator;
pub mod encoder;
pub mod field;
pub mod geojson;
pub mod kml;
pub mod map_html;
pub mod packet;
pub mod registry;
pub mod srt_parser;
pub mod stream;
pub mod summary;

pub use assembler::FrameAssembler;
pub use correlator::TemporalCorrelator;
pub use encoder::PacketBuilder;
pub use field::{FieldDecoder, FieldValue};
pub use geojson::feature_collection;
pub use kml::KmlExporter;
pub use map_html::render_map;
pub use packet::{KlvPacket, PacketParser, UniversalKey};
pub use registry::{KlvTag, TagRegistry, TagSpec};
pub use srt_parser::SrtParser;
pub use stream::{sniff_format, DecodeFailures, StreamDecodeResult, StreamDecoder, TelemetryInput};
pub use summary::{GeoBounds, MissionSummary};
