// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle distance for proximity checks.

use geo::{Distance, HaversineMeasure, Point};

use crate::models::LocationSnapshot;

/// Spherical-earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two points (x = longitude,
/// y = latitude, degrees).
pub fn haversine_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    HaversineMeasure::new(EARTH_RADIUS_METERS).distance(a, b)
}

/// Distance in meters between two latitude/longitude pairs.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Whether a position is inside a location's allowed radius.
pub fn within_radius(location: &LocationSnapshot, latitude: f64, longitude: f64) -> bool {
    haversine_distance(location.point(), Point::new(longitude, latitude)) <= location.allowed_radius
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [(f64, f64); 6] = [
        (0.0, 0.0),
        (25.0330, 121.5654),
        (-33.8688, 151.2093),
        (51.5074, -0.1278),
        (89.9, 179.9),
        (-45.0, -179.5),
    ];

    #[test]
    fn test_distance_to_self_is_zero() {
        for (lat, lng) in SAMPLES {
            assert!(distance_meters(lat, lng, lat, lng).abs() < 1e-6);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        for (lat1, lng1) in SAMPLES {
            for (lat2, lng2) in SAMPLES {
                let ab = distance_meters(lat1, lng1, lat2, lng2);
                let ba = distance_meters(lat2, lng2, lat1, lng1);
                assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
            }
        }
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = distance_meters(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn test_taipei_to_sydney() {
        let d = distance_meters(25.0330, 121.5654, -33.8688, 151.2093);
        assert!((d - 7_259_816.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_within_radius() {
        let gate = LocationSnapshot {
            id: 1,
            name: "Gate".to_string(),
            latitude: 25.0330,
            longitude: 121.5654,
            allowed_radius: 100.0,
        };
        // ~55 m north
        assert!(within_radius(&gate, 25.0335, 121.5654));
        // ~1.1 km north
        assert!(!within_radius(&gate, 25.0430, 121.5654));
    }
}
