//! Great-circle geometry between receiver and aircraft positions

use serde::Deserialize;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Position {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl Position {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Null Island, used when the receiver does not report its location
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Distance to another position in meters on a sphere of Earth radius
    pub fn distance_to(&self, other: &Position) -> f64 {
        haversine_distance(self, other, EARTH_RADIUS_M)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Position(lat={:.4}, lon={:.4})", self.latitude, self.longitude)
    }
}

/// Haversine distance between two positions, in the unit of `radius`
pub fn haversine_distance(pos1: &Position, pos2: &Position, radius: f64) -> f64 {
    let lat1 = pos1.latitude.to_radians();
    let lat2 = pos2.latitude.to_radians();
    let delta_lat = (pos2.latitude - pos1.latitude).to_radians();
    let delta_lon = (pos2.longitude - pos1.longitude).to_radians();

    let hav = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);

    // Rounding can push hav a hair above 1 for antipodal points
    2.0 * radius * hav.min(1.0).sqrt().asin()
}

/// Format a decimal, keeping at least one fractional digit (`42.0`, `42.17`)
pub fn decimal_label(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Convert meters to kilometers rounded to `decimals` places
pub fn to_kilometers(meters: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (meters / 1000.0 * scale).round() / scale
}
