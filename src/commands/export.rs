use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::models::TelemetryFrame;
use crate::services::{feature_collection, render_map, KmlExporter};

pub const KML_FILE: &str = "flight_path.kml";
pub const GEOJSON_FILE: &str = "flight_path.geojson";
pub const MAP_FILE: &str = "mission_map.html";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedFiles {
    pub kml: PathBuf,
    pub geojson: PathBuf,
    pub map: PathBuf,
}

/// Write the KML track, GeoJSON and HTML map for a flight into `dir`,
/// creating it if needed.
pub fn export_mission<P: AsRef<Path>>(
    dir: P,
    frames: &[TelemetryFrame],
    config: &ExportConfig,
) -> anyhow::Result<ExportedFiles> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {:?}", dir))?;

    let files = ExportedFiles {
        kml: dir.join(KML_FILE),
        geojson: dir.join(GEOJSON_FILE),
        map: dir.join(MAP_FILE),
    };

    let kml = KmlExporter::new(config).render(frames)?;
    write_file(&files.kml, kml.as_bytes())?;

    let geojson = serde_json::to_string_pretty(&feature_collection(frames))?;
    write_file(&files.geojson, geojson.as_bytes())?;

    write_file(&files.map, render_map(frames, config).as_bytes())?;

    tracing::info!(
        dir = %dir.display(),
        frames = frames.len(),
        "mission exported"
    );
    Ok(files)
}

fn write_file(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}
