//! Distances between stations and grid cells
//!
//! All distances are in kilometres.
//!
//! - **Planar**: Euclidean distance between easting/northing pairs in metres.
//! - **Geographic**: the north-south and east-west separations are scaled by
//!   the length of one degree of latitude and of longitude, read from
//!   tables tabulated every degree between 25°N and 52.5°N and linearly
//!   interpolated at each point's latitude. The two points' lengths are
//!   averaged, converted from statute miles and combined with Pythagoras.
//!   Latitudes outside the tables use the nearest tabulated value.
//!
//! Reference:
//! Garen, D.C., Johnson, G.L. & Hanson, C.L. (1994). Mean areal precipitation
//! for daily hydrologic modeling in mountainous regions. Water Resources
//! Bulletin 30(3), 481–491.

use dkrige_core::{CoordinateSystem, Location};
use ndarray::Array2;

/// Statute miles to kilometres
pub const KM_PER_MILE: f64 = 1.609;

const LATITUDE_TABLE_START: f64 = 25.5;
const LONGITUDE_TABLE_START: f64 = 25.0;

/// Length of one degree of latitude (statute miles), 25.5°N to 52.5°N
const DEGREE_OF_LATITUDE: [f64; 28] = [
    68.833, 68.842, 68.852, 68.862, 68.873, 68.883, 68.894, 68.905, 68.916, 68.928, 68.939,
    68.951, 68.962, 68.974, 68.986, 68.998, 69.011, 69.023, 69.035, 69.047, 69.060, 69.072,
    69.084, 69.096, 69.108, 69.121, 69.133, 69.145,
];

/// Length of one degree of longitude (statute miles), 25°N to 52°N
const DEGREE_OF_LONGITUDE: [f64; 28] = [
    62.729, 62.212, 61.676, 61.122, 60.548, 59.956, 59.345, 58.716, 58.071, 57.407, 56.725,
    56.027, 55.311, 54.579, 53.829, 53.063, 52.281, 51.483, 50.669, 49.840, 48.995, 48.136,
    47.261, 46.372, 45.469, 44.552, 43.621, 42.676,
];

fn degree_length(table: &[f64; 28], start: f64, latitude: f64) -> f64 {
    let last = table.len() - 1;
    let pos = (latitude - start).clamp(0.0, last as f64);
    let i = (pos.floor() as usize).min(last - 1);
    let frac = pos - i as f64;
    table[i] + frac * (table[i + 1] - table[i])
}

/// Distance between two longitude/latitude points (decimal degrees)
pub fn distance_ll(a: Location, b: Location) -> f64 {
    let lat_len = 0.5
        * (degree_length(&DEGREE_OF_LATITUDE, LATITUDE_TABLE_START, a.y)
            + degree_length(&DEGREE_OF_LATITUDE, LATITUDE_TABLE_START, b.y));
    let lon_len = 0.5
        * (degree_length(&DEGREE_OF_LONGITUDE, LONGITUDE_TABLE_START, a.y)
            + degree_length(&DEGREE_OF_LONGITUDE, LONGITUDE_TABLE_START, b.y));

    let ns = (a.y - b.y).abs() * KM_PER_MILE * lat_len;
    let ew = (a.x - b.x).abs() * KM_PER_MILE * lon_len;
    ns.hypot(ew)
}

/// Distance between two easting/northing points (metres)
pub fn distance_en(a: Location, b: Location) -> f64 {
    (a.x - b.x).hypot(a.y - b.y) / 1000.0
}

/// Distance in the given coordinate system
pub fn distance(system: CoordinateSystem, a: Location, b: Location) -> f64 {
    match system {
        CoordinateSystem::Planar => distance_en(a, b),
        CoordinateSystem::Geographic => distance_ll(a, b),
    }
}

/// Symmetric pairwise distance matrix with a zero diagonal
pub fn distance_matrix(system: CoordinateSystem, locations: &[Location]) -> Array2<f64> {
    let n = locations.len();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            distance(system, locations[i], locations[j])
        }
    })
}

/// Distances from one target point to every location
pub fn distances_to(system: CoordinateSystem, target: Location, locations: &[Location]) -> Vec<f64> {
    locations
        .iter()
        .map(|&loc| distance(system, target, loc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_planar_km() {
        let d = distance_en(Location::new(0.0, 0.0), Location::new(3000.0, 4000.0));
        assert_relative_eq!(d, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_geographic_north_south() {
        // One degree of latitude at 44.5°N..45.5°N, averaged
        let d = distance_ll(Location::new(-116.0, 44.5), Location::new(-116.0, 45.5));
        let expected = 0.5 * (69.047 + 69.060) * KM_PER_MILE;
        assert_relative_eq!(d, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_geographic_east_west_interpolated() {
        // Both points at 44.5°N: longitude length halfway between 44 and 45
        let d = distance_ll(Location::new(-116.0, 44.5), Location::new(-115.0, 44.5));
        let expected = 0.5 * (49.840 + 48.995) * KM_PER_MILE;
        assert_relative_eq!(d, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_latitude_clamped_outside_table() {
        let south = distance_ll(Location::new(-80.0, 10.0), Location::new(-79.0, 10.0));
        assert_relative_eq!(south, 62.729 * KM_PER_MILE, epsilon = 1e-9);

        let north = distance_ll(Location::new(-120.0, 60.0), Location::new(-119.0, 60.0));
        assert_relative_eq!(north, 42.676 * KM_PER_MILE, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_matrix_symmetric() {
        let locs = vec![
            Location::new(0.0, 0.0),
            Location::new(1000.0, 0.0),
            Location::new(0.0, 2000.0),
        ];
        let m = distance_matrix(CoordinateSystem::Planar, &locs);
        for i in 0..3 {
            assert_eq!(m[[i, i]], 0.0);
            for j in 0..3 {
                assert_relative_eq!(m[[i, j]], m[[j, i]]);
            }
        }
        assert_relative_eq!(m[[1, 2]], 5.0_f64.sqrt(), epsilon = 1e-12);
    }
}
