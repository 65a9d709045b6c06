//! Geographic helpers: coordinates, great-circle distance and arcs

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build a coordinate from optional parts, validating ranges
    ///
    /// Returns `None` if either part is missing or out of range, so a
    /// half-specified or garbage location is treated as unresolved.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        let (lat, lng) = (lat?, lng?);
        validate_lat_lng(lat, lng).ok()?;
        Some(Self { lat, lng })
    }

    /// GeoJSON position order is `[lng, lat]`
    pub fn to_position(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Check latitude in [-90, 90] and longitude in [-180, 180]
pub fn validate_lat_lng(lat: f64, lng: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::Validation(format!(
            "latitude must be a number in [-90, 90], got {}",
            lat
        )));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(Error::Validation(format!(
            "longitude must be a number in [-180, 180], got {}",
            lng
        )));
    }
    Ok(())
}

/// Great-circle distance between two coordinates (haversine)
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Shift `lng` by whole turns so it lies within 180 degrees of `prev`
fn unwrap_lng(prev: f64, lng: f64) -> f64 {
    lng - 360.0 * ((lng - prev) / 360.0).round()
}

/// Sample a great-circle arc from `a` to `b` as `steps + 1` points
///
/// Longitudes are unwrapped along the arc, so an arc crossing the
/// antimeridian continues past +/-180 instead of jumping across the map; the
/// end longitude may then differ from `b.lng` by 360. Coincident or antipodal
/// endpoints fall back to a straight two-point line.
pub fn great_circle_arc(a: Coordinate, b: Coordinate, steps: usize) -> Vec<Coordinate> {
    let steps = steps.max(1);
    let to_vec = |c: Coordinate| {
        let (lat, lng) = (c.lat.to_radians(), c.lng.to_radians());
        [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
    };

    let (va, vb) = (to_vec(a), to_vec(b));
    let dot = (va[0] * vb[0] + va[1] * vb[1] + va[2] * vb[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();

    if omega.abs() < 1e-9 || (std::f64::consts::PI - omega).abs() < 1e-9 {
        return vec![a, b];
    }

    let sin_omega = omega.sin();
    let mut points = Vec::with_capacity(steps + 1);
    points.push(a);
    let mut prev_lng = a.lng;
    for i in 1..steps {
        let t = i as f64 / steps as f64;
        let wa = ((1.0 - t) * omega).sin() / sin_omega;
        let wb = (t * omega).sin() / sin_omega;
        let x = wa * va[0] + wb * vb[0];
        let y = wa * va[1] + wb * vb[1];
        let z = wa * va[2] + wb * vb[2];
        let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
        let lng = unwrap_lng(prev_lng, y.atan2(x).to_degrees());
        points.push(Coordinate::new(lat, lng));
        prev_lng = lng;
    }
    points.push(Coordinate::new(b.lat, unwrap_lng(prev_lng, b.lng)));
    points
}
