//! Great-circle distance and path length
//!
//! Distances are computed with the haversine formula on a spherical Earth.
//! Path length filters out segments that are too short (jitter while parked)
//! or too long (position teleports after a fix is lost).

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Miles per meter
pub const MILES_PER_METER: f64 = 0.000621371;

/// Segments shorter than this are GPS jitter at rest
pub const MIN_SEGMENT_M: f64 = 1.0;

/// Segments longer than this are position jumps
pub const MAX_SEGMENT_M: f64 = 1000.0;

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance to another coordinate in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_m(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Haversine distance between two positions in meters.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Returns true if a segment of this length counts towards a trip
pub fn is_valid_segment(meters: f64) -> bool {
    (MIN_SEGMENT_M..=MAX_SEGMENT_M).contains(&meters)
}

/// Total length of a path in miles, skipping noise segments.
///
/// Returns 0 for fewer than two points.
pub fn accumulate_miles(path: &[Coordinate]) -> f64 {
    let meters: f64 = path
        .windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .filter(|d| is_valid_segment(*d))
        .sum();

    meters * MILES_PER_METER
}

/// Move a coordinate due north by the given number of meters
pub fn offset_north(from: Coordinate, meters: f64) -> Coordinate {
    let delta_lat = (meters / EARTH_RADIUS_M).to_degrees();
    Coordinate::new(from.latitude + delta_lat, from.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero() {
        assert_eq!(distance_m(51.5, -0.1, 51.5, -0.1), 0.0);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        // One degree of latitude is about 111.2 km on a 6371 km sphere
        let d = distance_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = distance_m(40.7128, -74.0060, 34.0522, -118.2437);
        let b = distance_m(34.0522, -118.2437, 40.7128, -74.0060);
        assert!((a - b).abs() < 1e-6);
        // New York to Los Angeles is roughly 3936 km
        assert!((a / 1000.0 - 3936.0).abs() < 10.0);
    }

    #[test]
    fn test_offset_north() {
        let start = Coordinate::new(37.0, -122.0);
        let moved = offset_north(start, 500.0);
        assert!((start.distance_to(&moved) - 500.0).abs() < 0.01);
    }

    #[test]
    fn test_accumulate_short_paths() {
        assert_eq!(accumulate_miles(&[]), 0.0);
        assert_eq!(accumulate_miles(&[Coordinate::new(10.0, 10.0)]), 0.0);
    }

    #[test]
    fn test_accumulate_excludes_outlier() {
        let p0 = Coordinate::new(37.0, -122.0);
        let p1 = offset_north(p0, 500.0);
        let p2 = offset_north(p1, 2000.0); // teleport
        let p3 = offset_north(p2, 500.0);

        let miles = accumulate_miles(&[p0, p1, p2, p3]);
        let expected = 1000.0 * MILES_PER_METER;
        assert!((miles - expected).abs() < 1e-4, "got {}", miles);
    }

    #[test]
    fn test_accumulate_excludes_jitter() {
        let p0 = Coordinate::new(37.0, -122.0);
        let p1 = offset_north(p0, 0.5);
        let p2 = offset_north(p1, 0.5);

        assert_eq!(accumulate_miles(&[p0, p1, p2]), 0.0);
    }

    #[test]
    fn test_accumulate_non_negative() {
        let path: Vec<Coordinate> = (0..20)
            .map(|i| Coordinate::new(37.0 + (i as f64) * 0.001, -122.0 - (i % 3) as f64 * 0.002))
            .collect();
        assert!(accumulate_miles(&path) >= 0.0);
    }
}
