//! Polyline representation for route geometries.
//!
//! Routes are held as decoded coordinate sequences. The compact encoded
//! format (precision 5) only appears at the boundary, when talking to the
//! routing service or handing a route to an external layer.

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::geo::{Coordinate, haversine_km};

const PRECISION: f64 = 1e5;

/// A road route as an ordered sequence of coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    /// Creates a new Polyline from decoded coordinate points.
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Two-point line used when no road geometry is available.
    pub fn straight(origin: Coordinate, destination: Coordinate) -> Self {
        Self::new(vec![origin, destination])
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the polyline has at least one segment.
    pub fn is_routable(&self) -> bool {
        self.points.len() >= 2
    }

    /// Sum of haversine segment lengths.
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum()
    }

    /// Encodes the polyline in the precision-5 polyline format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

        for point in &self.points {
            let lat = (point.lat * PRECISION).round() as i64;
            let lng = (point.lng * PRECISION).round() as i64;
            encode_value(lat - prev_lat, &mut out);
            encode_value(lng - prev_lng, &mut out);
            prev_lat = lat;
            prev_lng = lng;
        }

        out
    }

    /// Decodes a precision-5 encoded polyline.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = encoded.as_bytes();
        let mut index = 0;
        let (mut lat, mut lng) = (0i64, 0i64);
        let mut points = Vec::new();

        while index < bytes.len() {
            lat += decode_value(bytes, &mut index)?;
            lng += decode_value(bytes, &mut index)?;
            let point = Coordinate {
                lat: lat as f64 / PRECISION,
                lng: lng as f64 / PRECISION,
            };
            point.validate()?;
            points.push(point);
        }

        Ok(Self::new(points))
    }
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push((((v & 0x1f) | 0x20) as u8 + 63) as char);
        v >>= 5;
    }
    out.push((v as u8 + 63) as char);
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut result = 0i64;
    let mut shift = 0;

    loop {
        let byte = *bytes
            .get(*index)
            .ok_or_else(|| MarketError::Validation("truncated polyline".to_string()))?;
        *index += 1;

        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(MarketError::Validation(format!(
                "invalid polyline character {:?}",
                byte as char
            )));
        }

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    #[test]
    fn test_new_and_points() {
        let points = vec![c(38.5, -120.2), c(40.7, -120.95), c(43.252, -126.453)];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.points(), &points[..]);
        assert_eq!(polyline.len(), 3);
    }

    #[test]
    fn test_into_points() {
        let points = vec![c(38.5, -120.2), c(40.7, -120.95)];
        let polyline = Polyline::new(points.clone());
        assert_eq!(polyline.into_points(), points);
    }

    #[test]
    fn test_empty_polyline() {
        let polyline = Polyline::new(vec![]);
        assert!(polyline.is_empty());
        assert!(!polyline.is_routable());
        assert_eq!(polyline.length_km(), 0.0);
    }

    #[test]
    fn test_straight_line() {
        let line = Polyline::straight(c(-23.55, -46.63), c(-22.90, -47.06));
        assert!(line.is_routable());
        assert_eq!(line.len(), 2);
        assert!((line.length_km() - haversine_km(c(-23.55, -46.63), c(-22.90, -47.06))).abs() < 1e-9);
    }

    #[test]
    fn test_encode_reference_example() {
        // Reference vector from the polyline format documentation.
        let polyline = Polyline::new(vec![c(38.5, -120.2), c(40.7, -120.95), c(43.252, -126.453)]);
        assert_eq!(polyline.encode(), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn test_decode_reference_example() {
        let polyline = Polyline::decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let expected = [c(38.5, -120.2), c(40.7, -120.95), c(43.252, -126.453)];
        assert_eq!(polyline.len(), 3);
        for (got, want) in polyline.points().iter().zip(expected.iter()) {
            assert!((got.lat - want.lat).abs() < 1e-9);
            assert!((got.lng - want.lng).abs() < 1e-9);
        }
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        assert!(Polyline::decode("_p~iF~ps|U_").is_err());
        assert!(Polyline::decode("_p~i").is_err());
    }
}
