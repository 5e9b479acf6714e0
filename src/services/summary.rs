use serde::{Deserialize, Serialize};

use crate::models::TelemetryFrame;

/// Lat/lon bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    fn around(lat: f64, lon: f64) -> Self {
        Self {
            min_lat: lat,
            min_lon: lon,
            max_lat: lat,
            max_lon: lon,
        }
    }

    fn extend(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lat = self.max_lat.max(lat);
        self.max_lon = self.max_lon.max(lon);
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Aggregate figures for a decoded flight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionSummary {
    pub frame_count: usize,
    pub start_us: Option<u64>,
    pub end_us: Option<u64>,
    pub duration_secs: f64,
    /// Sensor ground track length (meters)
    pub distance_m: f64,
    /// Frames that carry a sensor position
    pub positioned_frames: usize,
    /// Frames that carry a frame-center point
    pub targeted_frames: usize,
    /// Box around every known sensor and frame-center position
    pub bounds: Option<GeoBounds>,
    pub center: Option<(f64, f64)>,
}

impl MissionSummary {
    pub fn from_frames(frames: &[TelemetryFrame]) -> Self {
        if frames.is_empty() {
            return Self::default();
        }

        let start_us = frames.iter().map(|f| f.timestamp_us).min();
        let end_us = frames.iter().map(|f| f.timestamp_us).max();
        let duration_secs = match (start_us, end_us) {
            (Some(start), Some(end)) => (end - start) as f64 / 1_000_000.0,
            _ => 0.0,
        };

        let sensor_track: Vec<(f64, f64)> =
            frames.iter().filter_map(|f| f.sensor.position()).collect();
        let distance_m = sensor_track
            .windows(2)
            .map(|pair| haversine_distance(pair[0].0, pair[0].1, pair[1].0, pair[1].1))
            .sum();

        let target_track: Vec<(f64, f64)> = frames
            .iter()
            .filter_map(|f| f.target.as_ref().map(|t| (t.lat, t.lon)))
            .collect();

        let mut bounds: Option<GeoBounds> = None;
        for &(lat, lon) in sensor_track.iter().chain(target_track.iter()) {
            match bounds.as_mut() {
                Some(b) => b.extend(lat, lon),
                None => bounds = Some(GeoBounds::around(lat, lon)),
            }
        }

        Self {
            frame_count: frames.len(),
            start_us,
            end_us,
            duration_secs,
            distance_m,
            positioned_frames: sensor_track.len(),
            targeted_frames: target_track.len(),
            center: bounds.map(|b| b.center()),
            bounds,
        }
    }
}

/// Great-circle distance between two GPS points in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FrameClock, TargetPoint};

    fn make_frame(secs: u64, lat: f64, lon: f64) -> TelemetryFrame {
        let mut frame = TelemetryFrame::new(secs * 1_000_000, FrameClock::Absolute);
        frame.sensor.lat = Some(lat);
        frame.sensor.lon = Some(lon);
        frame
    }

    #[test]
    fn test_empty() {
        let summary = MissionSummary::from_frames(&[]);
        assert_eq!(summary.frame_count, 0);
        assert!(summary.bounds.is_none());
        assert_eq!(summary.distance_m, 0.0);
    }

    #[test]
    fn test_distance_and_duration() {
        // 0.001 degree latitude is roughly 111 meters
        let frames = vec![
            make_frame(10, 40.0, -74.0),
            make_frame(11, 40.001, -74.0),
            make_frame(12, 40.002, -74.0),
        ];
        let summary = MissionSummary::from_frames(&frames);

        assert_eq!(summary.frame_count, 3);
        assert_eq!(summary.start_us, Some(10_000_000));
        assert_eq!(summary.end_us, Some(12_000_000));
        assert!((summary.duration_secs - 2.0).abs() < 1e-9);
        assert!(summary.distance_m > 215.0 && summary.distance_m < 230.0);
    }

    #[test]
    fn test_bounds_include_targets() {
        let mut frame = make_frame(0, 10.0, 20.0);
        frame.target = Some(TargetPoint {
            lat: 10.5,
            lon: 19.5,
            elevation_m: None,
        });
        let mut no_fix = TelemetryFrame::new(1_000_000, FrameClock::Absolute);
        no_fix.sensor.alt_msl_m = Some(300.0);

        let summary = MissionSummary::from_frames(&[frame, no_fix]);
        let bounds = summary.bounds.unwrap();

        assert_eq!(summary.positioned_frames, 1);
        assert_eq!(summary.targeted_frames, 1);
        assert_eq!((bounds.min_lat, bounds.max_lat), (10.0, 10.5));
        assert_eq!((bounds.min_lon, bounds.max_lon), (19.5, 20.0));
        assert_eq!(summary.center, Some((10.25, 19.75)));
    }

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_distance(51.5, -0.1, 51.5, -0.1), 0.0);
    }
}
