//! KML document of a flight: sensor track, frame-center track and one
//! timestamped placemark per frame.

use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use crate::config::ExportConfig;
use crate::error::{GeointError, Result};
use crate::models::{FrameClock, TelemetryFrame};

const KML_NS: &str = "http://www.opengis.net/kml/2.2";

pub struct KmlExporter<'c> {
    config: &'c ExportConfig,
}

impl<'c> KmlExporter<'c> {
    pub fn new(config: &'c ExportConfig) -> Self {
        Self { config }
    }

    /// Render the whole document.
    pub fn render(&self, frames: &[TelemetryFrame]) -> Result<String> {
        let mut buffer = Vec::new();
        let mut writer = Writer::new_with_indent(&mut buffer, b' ', 2);

        write(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        let mut kml = BytesStart::new("kml");
        kml.push_attribute(("xmlns", KML_NS));
        write(&mut writer, Event::Start(kml))?;
        start(&mut writer, "Document")?;
        text_element(&mut writer, "name", &self.config.title)?;

        self.write_line_style(&mut writer, "sensor-track", &self.config.sensor_color, 3)?;
        self.write_line_style(&mut writer, "target-track", &self.config.target_color, 2)?;

        self.write_sensor_track(&mut writer, frames)?;
        self.write_target_track(&mut writer, frames)?;
        self.write_frames(&mut writer, frames)?;

        end(&mut writer, "Document")?;
        end(&mut writer, "kml")?;

        String::from_utf8(buffer).map_err(|e| GeointError::Export(format!("UTF-8 error: {}", e)))
    }

    fn write_line_style<W: Write>(
        &self,
        writer: &mut Writer<W>,
        id: &str,
        color: &str,
        width: u32,
    ) -> Result<()> {
        let mut style = BytesStart::new("Style");
        style.push_attribute(("id", id));
        write(writer, Event::Start(style))?;
        start(writer, "LineStyle")?;
        text_element(writer, "color", color)?;
        text_element(writer, "width", &width.to_string())?;
        end(writer, "LineStyle")?;
        start(writer, "IconStyle")?;
        text_element(writer, "color", color)?;
        text_element(writer, "scale", "0.5")?;
        end(writer, "IconStyle")?;
        end(writer, "Style")
    }

    fn write_sensor_track<W: Write>(
        &self,
        writer: &mut Writer<W>,
        frames: &[TelemetryFrame],
    ) -> Result<()> {
        let points: Vec<String> = frames
            .iter()
            .filter_map(|f| {
                let (lat, lon) = f.sensor.position()?;
                Some(coordinate(lat, lon, sensor_altitude(f)))
            })
            .collect();
        if points.is_empty() {
            return Ok(());
        }
        // MSL altitude is absolute; relative altitude from subtitles is above take-off
        let altitude_mode = if frames.iter().any(|f| f.sensor.alt_msl_m.is_some()) {
            "absolute"
        } else {
            "relativeToGround"
        };
        write_line_string(writer, "Sensor track", "#sensor-track", altitude_mode, &points)
    }

    fn write_target_track<W: Write>(
        &self,
        writer: &mut Writer<W>,
        frames: &[TelemetryFrame],
    ) -> Result<()> {
        let points: Vec<String> = frames
            .iter()
            .filter_map(|f| f.target.as_ref())
            .map(|t| coordinate(t.lat, t.lon, 0.0))
            .collect();
        if points.is_empty() {
            return Ok(());
        }
        write_line_string(writer, "Frame center track", "#target-track", "clampToGround", &points)
    }

    fn write_frames<W: Write>(&self, writer: &mut Writer<W>, frames: &[TelemetryFrame]) -> Result<()> {
        start(writer, "Folder")?;
        text_element(writer, "name", "Frames")?;

        for frame in frames {
            let Some((lat, lon)) = frame.sensor.position() else {
                continue;
            };
            start(writer, "Placemark")?;
            // KML 2.2 fixes the Feature child order
            text_element(writer, "name", &frame_label(frame))?;
            text_element(writer, "description", &frame_description(frame))?;
            if let Some(when) = frame.datetime() {
                start(writer, "TimeStamp")?;
                text_element(writer, "when", &when.to_rfc3339_opts(SecondsFormat::Millis, true))?;
                end(writer, "TimeStamp")?;
            }
            text_element(writer, "styleUrl", "#sensor-track")?;
            let altitude_mode = if frame.sensor.alt_msl_m.is_some() {
                "absolute"
            } else {
                "relativeToGround"
            };
            start(writer, "Point")?;
            text_element(writer, "altitudeMode", altitude_mode)?;
            text_element(writer, "coordinates", &coordinate(lat, lon, sensor_altitude(frame)))?;
            end(writer, "Point")?;
            end(writer, "Placemark")?;
        }

        end(writer, "Folder")
    }
}

fn write_line_string<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    style_url: &str,
    altitude_mode: &str,
    points: &[String],
) -> Result<()> {
    start(writer, "Placemark")?;
    text_element(writer, "name", name)?;
    text_element(writer, "styleUrl", style_url)?;
    start(writer, "LineString")?;
    text_element(writer, "tessellate", "1")?;
    text_element(writer, "altitudeMode", altitude_mode)?;
    text_element(writer, "coordinates", &points.join(" "))?;
    end(writer, "LineString")?;
    end(writer, "Placemark")
}

/// KML `lon,lat,alt` tuple
fn coordinate(lat: f64, lon: f64, alt: f64) -> String {
    format!("{:.7},{:.7},{:.1}", lon, lat, alt)
}

fn sensor_altitude(frame: &TelemetryFrame) -> f64 {
    frame
        .sensor
        .alt_msl_m
        .or(frame.sensor.relative_alt_m)
        .unwrap_or(0.0)
}

pub(crate) fn frame_label(frame: &TelemetryFrame) -> String {
    match frame.clock {
        FrameClock::Absolute => frame
            .datetime()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| frame.timestamp_us.to_string()),
        FrameClock::MediaRelative => format!("+{:.3}s", frame.timestamp_us as f64 / 1_000_000.0),
    }
}

fn frame_description(frame: &TelemetryFrame) -> String {
    let mut parts = Vec::new();
    if let Some(alt) = frame.sensor.alt_msl_m.or(frame.sensor.relative_alt_m) {
        parts.push(format!("alt {:.1} m", alt));
    }
    if let Some(heading) = frame.sensor.true_heading_deg {
        parts.push(format!("heading {:.1}°", heading));
    }
    if let Some(fov) = frame.sensor.h_fov_deg {
        parts.push(format!("hfov {:.2}°", fov));
    }
    if let Some(target) = &frame.target {
        parts.push(format!("frame center {:.6}, {:.6}", target.lat, target.lon));
    }
    parts.join(", ")
}

fn write<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| GeointError::Export(format!("XML write error: {}", e)))
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    write(writer, Event::End(BytesEnd::new(name)))
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    start(writer, name)?;
    write(writer, Event::Text(BytesText::new(text)))?;
    end(writer, name)
}
