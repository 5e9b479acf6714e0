//! Single-file HTML mission map. Everything is inline (SVG, style, script,
//! data) so the page opens offline.

use quick_xml::escape::escape;

use crate::config::ExportConfig;
use crate::models::TelemetryFrame;
use crate::services::geojson::feature_collection;
use crate::services::kml::frame_label;
use crate::services::summary::{GeoBounds, MissionSummary};

const PADDING: f64 = 40.0;
const MIN_SPAN_DEG: f64 = 0.001;
const GRID_STEPS: [f64; 14] = [
    0.0001, 0.0002, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 5.0,
];

const STYLE: &str = r#"
body { margin: 0; font-family: sans-serif; background: #1b1f24; color: #d8dee4; }
header { padding: 8px 16px; }
header h1 { font-size: 18px; margin: 0 0 4px 0; }
header p { font-size: 12px; margin: 0; color: #9aa5b1; }
svg { display: block; background: #0f1317; cursor: grab; }
svg.dragging { cursor: grabbing; }
.grid { stroke: #2c343d; stroke-width: 1; vector-effect: non-scaling-stroke; }
.grid-label { fill: #56606b; font-size: 10px; }
.track { fill: none; stroke-width: 2; vector-effect: non-scaling-stroke; }
.frame { stroke: #0f1317; stroke-width: 1; vector-effect: non-scaling-stroke; }
"#;

const SCRIPT: &str = r#"
(function () {
  const svg = document.getElementById('map');
  const base = svg.viewBox.baseVal;
  let view = { x: base.x, y: base.y, w: base.width, h: base.height };
  let drag = null;

  function apply() {
    svg.setAttribute('viewBox', view.x + ' ' + view.y + ' ' + view.w + ' ' + view.h);
  }

  function toMap(evt) {
    const rect = svg.getBoundingClientRect();
    return {
      x: view.x + (evt.clientX - rect.left) / rect.width * view.w,
      y: view.y + (evt.clientY - rect.top) / rect.height * view.h,
    };
  }

  svg.addEventListener('wheel', function (evt) {
    evt.preventDefault();
    const p = toMap(evt);
    const k = evt.deltaY < 0 ? 0.8 : 1.25;
    view = { x: p.x - (p.x - view.x) * k, y: p.y - (p.y - view.y) * k, w: view.w * k, h: view.h * k };
    apply();
  }, { passive: false });

  svg.addEventListener('mousedown', function (evt) {
    drag = { x: evt.clientX, y: evt.clientY, view: Object.assign({}, view) };
    svg.classList.add('dragging');
  });

  window.addEventListener('mousemove', function (evt) {
    if (!drag) return;
    const rect = svg.getBoundingClientRect();
    view.x = drag.view.x - (evt.clientX - drag.x) / rect.width * view.w;
    view.y = drag.view.y - (evt.clientY - drag.y) / rect.height * view.h;
    apply();
  });

  window.addEventListener('mouseup', function () {
    drag = null;
    svg.classList.remove('dragging');
  });

  svg.addEventListener('dblclick', function () {
    view = { x: 0, y: 0, w: base.width, h: base.height };
    apply();
  });
})();
"#;

/// Equirectangular projection of a bounding box onto the map canvas.
struct Projection {
    min_lon: f64,
    max_lat: f64,
    lon_factor: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    fn fit(bounds: &GeoBounds, width: f64, height: f64) -> Self {
        let (center_lat, center_lon) = bounds.center();
        let lat_span = (bounds.max_lat - bounds.min_lat).max(MIN_SPAN_DEG);
        let lon_span = (bounds.max_lon - bounds.min_lon).max(MIN_SPAN_DEG);
        let lon_factor = center_lat.to_radians().cos().max(0.01);

        let usable_w = (width - 2.0 * PADDING).max(1.0);
        let usable_h = (height - 2.0 * PADDING).max(1.0);
        let scale = (usable_w / (lon_span * lon_factor)).min(usable_h / lat_span);

        let min_lon = center_lon - lon_span / 2.0;
        let max_lat = center_lat + lat_span / 2.0;
        Self {
            min_lon,
            max_lat,
            lon_factor,
            scale,
            offset_x: (width - lon_span * lon_factor * scale) / 2.0,
            offset_y: (height - lat_span * scale) / 2.0,
        }
    }

    fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            self.offset_x + (lon - self.min_lon) * self.lon_factor * self.scale,
            self.offset_y + (self.max_lat - lat) * self.scale,
        )
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.max_lat - (y - self.offset_y) / self.scale,
            self.min_lon + (x - self.offset_x) / (self.lon_factor * self.scale),
        )
    }
}

/// Render the mission map page.
pub fn render_map(frames: &[TelemetryFrame], config: &ExportConfig) -> String {
    let summary = MissionSummary::from_frames(frames);
    let width = config.map_width as f64;
    let height = config.map_height as f64;
    let title = escape(config.title.as_str());

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", title));
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
    html.push_str(&format!(
        "<header><h1>{}</h1><p>{} frames, {:.1} s, {:.0} m sensor track. Scroll to zoom, drag to pan, double-click to reset.</p></header>\n",
        title, summary.frame_count, summary.duration_secs, summary.distance_m
    ));

    html.push_str(&format!(
        "<svg id=\"map\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = config.map_width,
        h = config.map_height
    ));
    match summary.bounds {
        Some(bounds) => {
            let projection = Projection::fit(&bounds, width, height);
            write_graticule(&mut html, &projection, width, height);
            write_tracks(&mut html, &projection, frames, config);
            write_frame_markers(&mut html, &projection, frames, config);
        }
        None => {
            html.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" class=\"grid-label\">No positioned telemetry</text>\n",
                width / 2.0,
                height / 2.0
            ));
        }
    }
    html.push_str("</svg>\n");

    // `</` would close the script element early
    let data = feature_collection(frames).to_string().replace("</", "<\\/");
    html.push_str(&format!(
        "<script type=\"application/geo+json\" id=\"mission-data\">{}</script>\n",
        data
    ));
    html.push_str(&format!("<script>{}</script>\n</body>\n</html>\n", SCRIPT));
    html
}

fn write_graticule(html: &mut String, projection: &Projection, width: f64, height: f64) {
    let (top_lat, left_lon) = projection.unproject(0.0, 0.0);
    let (bottom_lat, right_lon) = projection.unproject(width, height);
    let step = grid_step((top_lat - bottom_lat).max(right_lon - left_lon));
    let decimals = (-step.log10()).ceil().max(0.0) as usize;

    html.push_str("<g id=\"graticule\">\n");
    let mut lon = (left_lon / step).ceil() * step;
    while lon <= right_lon {
        let (x, _) = projection.project(top_lat, lon);
        html.push_str(&format!(
            "<line class=\"grid\" x1=\"{x:.1}\" y1=\"0\" x2=\"{x:.1}\" y2=\"{height}\"/><text class=\"grid-label\" x=\"{:.1}\" y=\"{:.1}\">{:.*}</text>\n",
            x + 2.0,
            height - 4.0,
            decimals,
            lon
        ));
        lon += step;
    }
    let mut lat = (bottom_lat / step).ceil() * step;
    while lat <= top_lat {
        let (_, y) = projection.project(lat, left_lon);
        html.push_str(&format!(
            "<line class=\"grid\" x1=\"0\" y1=\"{y:.1}\" x2=\"{width}\" y2=\"{y:.1}\"/><text class=\"grid-label\" x=\"2\" y=\"{:.1}\">{:.*}</text>\n",
            y - 2.0,
            decimals,
            lat
        ));
        lat += step;
    }
    html.push_str("</g>\n");
}

/// Smallest step that keeps the grid to about ten lines across the view
fn grid_step(span_deg: f64) -> f64 {
    GRID_STEPS
        .iter()
        .copied()
        .find(|step| span_deg / step <= 10.0)
        .unwrap_or(10.0)
}

fn write_tracks(
    html: &mut String,
    projection: &Projection,
    frames: &[TelemetryFrame],
    config: &ExportConfig,
) {
    let target_points: Vec<(f64, f64)> = frames
        .iter()
        .filter_map(|f| f.target.as_ref().map(|t| projection.project(t.lat, t.lon)))
        .collect();
    write_polyline(html, "target-track", &target_points, &config.target_color);

    let sensor_points: Vec<(f64, f64)> = frames
        .iter()
        .filter_map(|f| f.sensor.position())
        .map(|(lat, lon)| projection.project(lat, lon))
        .collect();
    write_polyline(html, "sensor-track", &sensor_points, &config.sensor_color);
}

fn write_polyline(html: &mut String, id: &str, points: &[(f64, f64)], kml_color: &str) {
    if points.len() < 2 {
        return;
    }
    let (color, opacity) = css_color(kml_color);
    let coords: Vec<String> = points.iter().map(|(x, y)| format!("{:.1},{:.1}", x, y)).collect();
    html.push_str(&format!(
        "<polyline id=\"{}\" class=\"track\" stroke=\"{}\" stroke-opacity=\"{:.2}\" points=\"{}\"/>\n",
        id,
        color,
        opacity,
        coords.join(" ")
    ));
}

fn write_frame_markers(
    html: &mut String,
    projection: &Projection,
    frames: &[TelemetryFrame],
    config: &ExportConfig,
) {
    let (color, _) = css_color(&config.sensor_color);
    html.push_str("<g id=\"frames\">\n");
    for frame in frames {
        let Some((lat, lon)) = frame.sensor.position() else {
            continue;
        };
        let (x, y) = projection.project(lat, lon);
        let mut label = format!("{} ({:.6}, {:.6})", frame_label(frame), lat, lon);
        if let Some(alt) = frame.sensor.alt_msl_m.or(frame.sensor.relative_alt_m) {
            label.push_str(&format!(" alt {:.1} m", alt));
        }
        html.push_str(&format!(
            "<circle class=\"frame\" cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{}\"><title>{}</title></circle>\n",
            x,
            y,
            color,
            escape(label.as_str())
        ));
    }
    html.push_str("</g>\n");
}

/// KML `aabbggrr` to a CSS `#rrggbb` color and an opacity in [0, 1].
fn css_color(kml: &str) -> (String, f64) {
    let hex = |range: std::ops::Range<usize>| kml.get(range).unwrap_or("ff");
    let alpha = u8::from_str_radix(hex(0..2), 16).unwrap_or(255);
    (
        format!("#{}{}{}", hex(6..8), hex(4..6), hex(2..4)),
        alpha as f64 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameClock, TargetPoint};

    fn track() -> Vec<TelemetryFrame> {
        (0..4u64)
            .map(|i| {
                let mut frame = TelemetryFrame::new(1_700_000_000_000_000 + i * 1_000_000, FrameClock::Absolute);
                frame.sensor.lat = Some(45.0 + i as f64 * 0.001);
                frame.sensor.lon = Some(7.0 + i as f64 * 0.002);
                frame.target = Some(TargetPoint {
                    lat: 45.01,
                    lon: 7.01,
                    elevation_m: None,
                });
                frame
            })
            .collect()
    }

    #[test]
    fn test_css_color() {
        assert_eq!(css_color("ff0000ff"), ("#ff0000".to_string(), 1.0));
        assert_eq!(css_color("80ffaa00").0, "#00aaff");
    }

    #[test]
    fn test_grid_step() {
        assert_eq!(grid_step(0.004), 0.0005);
        assert_eq!(grid_step(1.5), 0.2);
        assert_eq!(grid_step(400.0), 10.0);
    }

    #[test]
    fn test_projection_inside_canvas() {
        let bounds = GeoBounds {
            min_lat: 45.0,
            min_lon: 7.0,
            max_lat: 45.01,
            max_lon: 7.02,
        };
        let projection = Projection::fit(&bounds, 960.0, 640.0);
        for (lat, lon) in [(45.0, 7.0), (45.01, 7.02), (45.005, 7.01)] {
            let (x, y) = projection.project(lat, lon);
            assert!((PADDING - 0.01..=960.0 - PADDING + 0.01).contains(&x));
            assert!((PADDING - 0.01..=640.0 - PADDING + 0.01).contains(&y));
        }
        let (x, y) = projection.project(45.005, 7.01);
        assert!((x - 480.0).abs() < 1e-6 && (y - 320.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_map() {
        let config = ExportConfig {
            title: "<Recon>".to_string(),
            ..Default::default()
        };
        let html = render_map(&track(), &config);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>&lt;Recon&gt;</title>"));
        assert!(html.contains("id=\"graticule\""));
        assert!(html.contains("id=\"sensor-track\""));
        assert!(html.contains("id=\"target-track\""));
        assert_eq!(html.matches("<circle").count(), 4);
        assert!(html.contains("\"FeatureCollection\""));
        assert!(html.contains("addEventListener('wheel'"));
        assert!(!html.contains("src=\""));
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn test_no_positions() {
        let frames = vec![TelemetryFrame::new(0, FrameClock::MediaRelative)];
        let html = render_map(&frames, &ExportConfig::default());
        assert!(html.contains("No positioned telemetry"));
        assert!(!html.contains("<circle"));
    }
}
