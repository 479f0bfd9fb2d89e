//! Great-circle geometry over lat/lng coordinates.
//!
//! Distances are haversine kilometers. Point-to-segment projection uses an
//! equirectangular approximation, which is accurate at corridor scale
//! (tens of kilometers) and cheap enough to run over long polylines.

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coordinate = Self { lat, lng };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(MarketError::Validation(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(MarketError::Validation(format!(
                "longitude {} outside [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }
}

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Projection parameter of `point` onto the segment, clamped to [0, 1].
///
/// Returns `None` for a degenerate segment.
fn segment_parameter(point: Coordinate, start: Coordinate, end: Coordinate) -> Option<f64> {
    let scale = ((start.lat + end.lat) / 2.0).to_radians().cos();

    let seg_x = (end.lng - start.lng) * scale;
    let seg_y = end.lat - start.lat;
    let len_sq = seg_x * seg_x + seg_y * seg_y;
    if len_sq == 0.0 {
        return None;
    }

    let pt_x = (point.lng - start.lng) * scale;
    let pt_y = point.lat - start.lat;
    let t = (pt_x * seg_x + pt_y * seg_y) / len_sq;

    Some(t.clamp(0.0, 1.0))
}

fn interpolate(start: Coordinate, end: Coordinate, t: f64) -> Coordinate {
    Coordinate {
        lat: start.lat + t * (end.lat - start.lat),
        lng: start.lng + t * (end.lng - start.lng),
    }
}

/// Distance from `point` to the closest point of the segment `start..end`.
pub fn point_to_segment_km(point: Coordinate, start: Coordinate, end: Coordinate) -> f64 {
    match segment_parameter(point, start, end) {
        Some(t) => haversine_km(point, interpolate(start, end, t)),
        None => haversine_km(point, start),
    }
}

/// Minimum distance from `point` to any segment of the polyline.
///
/// Polylines with fewer than two points have no segments, so the distance
/// is `f64::INFINITY`.
pub fn point_to_polyline_km(point: Coordinate, polyline: &[Coordinate]) -> f64 {
    polyline
        .windows(2)
        .map(|pair| point_to_segment_km(point, pair[0], pair[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Position of the point's nearest projection along the polyline, as a
/// fractional segment index (`2.5` is halfway along the third segment).
pub fn route_progress(point: Coordinate, polyline: &[Coordinate]) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;

    for (index, pair) in polyline.windows(2).enumerate() {
        let t = segment_parameter(point, pair[0], pair[1]).unwrap_or(0.0);
        let distance = haversine_km(point, interpolate(pair[0], pair[1], t));
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, index as f64 + t)),
        }
    }

    best.map(|(_, progress)| progress)
}
