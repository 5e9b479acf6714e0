use serde_json::{json, Value};

use crate::models::TelemetryFrame;
use crate::services::kml::frame_label;

/// GeoJSON `FeatureCollection`: the sensor and frame-center tracks as
/// `LineString`s, then one `Point` per positioned frame.
pub fn feature_collection(frames: &[TelemetryFrame]) -> Value {
    let mut features = Vec::new();

    let sensor_track: Vec<Value> = frames
        .iter()
        .filter_map(|f| {
            let (lat, lon) = f.sensor.position()?;
            Some(match f.sensor.alt_msl_m.or(f.sensor.relative_alt_m) {
                Some(alt) => json!([lon, lat, alt]),
                None => json!([lon, lat]),
            })
        })
        .collect();
    if !sensor_track.is_empty() {
        features.push(line_feature("sensor", sensor_track));
    }

    let target_track: Vec<Value> = frames
        .iter()
        .filter_map(|f| f.target.as_ref())
        .map(|t| json!([t.lon, t.lat]))
        .collect();
    if !target_track.is_empty() {
        features.push(line_feature("target", target_track));
    }

    for frame in frames {
        let Some((lat, lon)) = frame.sensor.position() else {
            continue;
        };
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [lon, lat] },
            "properties": {
                "kind": "frame",
                "label": frame_label(frame),
                "timestamp_us": frame.timestamp_us,
                "clock": frame.clock,
                "alt_msl_m": frame.sensor.alt_msl_m,
                "relative_alt_m": frame.sensor.relative_alt_m,
                "true_heading_deg": frame.sensor.true_heading_deg,
                "h_fov_deg": frame.sensor.h_fov_deg,
                "target": frame.target.as_ref().map(|t| json!([t.lon, t.lat])),
            }
        }));
    }

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn line_feature(kind: &str, coordinates: Vec<Value>) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": coordinates },
        "properties": { "kind": kind },
    })
}
