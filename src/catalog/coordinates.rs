//! Swiss LV95 (EPSG:2056) to WGS84 conversion.
//!
//! Uses the swisstopo approximation formulas, accurate to about one metre
//! inside Switzerland.

/// Geodetic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub longitude: f64,
    pub latitude: f64,
}

/// Project an LV95 east/north pair to WGS84 longitude/latitude.
#[must_use]
pub fn lv95_to_wgs84(east: f64, north: f64) -> LonLat {
    // Auxiliary values relative to the Bern reference point, in 1000 km
    let y = (east - 2_600_000.0) / 1_000_000.0;
    let x = (north - 1_200_000.0) / 1_000_000.0;

    // Results in 10000" units
    let lambda = 2.677_909_4 + 4.728_982 * y + 0.791_484 * y * x + 0.130_6 * y * x * x
        - 0.043_6 * y * y * y;
    let phi = 16.902_389_2 + 3.238_272 * x
        - 0.270_978 * y * y
        - 0.002_528 * x * x
        - 0.044_7 * y * y * x
        - 0.014_0 * x * x * x;

    LonLat {
        longitude: lambda * 100.0 / 36.0,
        latitude: phi * 100.0 / 36.0,
    }
}
