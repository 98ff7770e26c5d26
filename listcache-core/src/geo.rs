//! Great-circle distance on a spherical Earth.
//!
//! The constants match the geospatial index of the cache store, so an
//! in-process search returns the same distances as the store would.

use crate::types::{Coordinates, DistanceUnit};

/// Earth's radius in meters as used by the geospatial index.
pub const EARTH_RADIUS_METERS: f64 = 6_372_797.560_856;

/// Highest latitude a geohash-backed index can store.
pub const MAX_INDEXABLE_LATITUDE: f64 = 85.051_128_78;

/// Decimal places kept on reported distances.
pub const DISTANCE_PRECISION: i32 = 4;

/// Haversine distance between two points, in meters.
pub fn great_circle_meters(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let u = ((lat2 - lat1) / 2.0).sin();
    let v = ((to.longitude - from.longitude).to_radians() / 2.0).sin();
    let a = u * u + lat1.cos() * lat2.cos() * v * v;
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

/// Haversine distance between two points in the given unit.
pub fn great_circle_distance(from: Coordinates, to: Coordinates, unit: DistanceUnit) -> f64 {
    great_circle_meters(from, to) / unit.meters_per_unit()
}

/// Round a distance the way the index reports it.
pub fn round_distance(distance: f64) -> f64 {
    let factor = 10f64.powi(DISTANCE_PRECISION);
    (distance * factor).round() / factor
}

/// The point `distance` units due north of `origin`.
///
/// Moving along a meridian keeps the great-circle distance exact, which makes
/// this handy for placing fixtures at known distances.
pub fn offset_north(origin: Coordinates, distance: f64, unit: DistanceUnit) -> Coordinates {
    let meters = distance * unit.meters_per_unit();
    let delta_degrees = (meters / EARTH_RADIUS_METERS).to_degrees();
    Coordinates::new(origin.longitude, origin.latitude + delta_degrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinates::new(-73.9, 40.73);
        assert_eq!(great_circle_meters(p, p), 0.0);
    }

    #[test]
    fn test_known_distance_new_york_to_los_angeles() {
        let nyc = Coordinates::new(-74.0060, 40.7128);
        let la = Coordinates::new(-118.2437, 34.0522);
        let km = great_circle_distance(nyc, la, DistanceUnit::Kilometers);
        // Roughly 3936 km on a sphere.
        assert!((km - 3935.0).abs() < 10.0, "got {}", km);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Coordinates::new(2.3522, 48.8566);
        let b = Coordinates::new(-0.1276, 51.5072);
        let ab = great_circle_meters(a, b);
        let ba = great_circle_meters(b, a);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_offset_north_round_trips() {
        let origin = Coordinates::new(-73.9, 40.73);
        for miles in [0.5, 2.0, 25.0] {
            let p = offset_north(origin, miles, DistanceUnit::Miles);
            let d = great_circle_distance(origin, p, DistanceUnit::Miles);
            assert!((d - miles).abs() < 1e-9, "{} vs {}", d, miles);
        }
    }

    #[test]
    fn test_round_distance() {
        assert_eq!(round_distance(1.234_56), 1.2346);
        assert_eq!(round_distance(0.000_04), 0.0);
    }
}
