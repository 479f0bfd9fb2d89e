//! OSRM HTTP adapter for trip route geometries.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MarketError, Result};
use crate::geo::Coordinate;
use crate::polyline::Polyline;
use crate::traits::RouteProvider;

/// Geometry encoding requested from OSRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    GeoJson,
    Polyline,
}

impl GeometryFormat {
    fn as_param(&self) -> &'static str {
        match self {
            GeometryFormat::GeoJson => "geojson",
            GeometryFormat::Polyline => "polyline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    pub geometries: GeometryFormat,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
            geometries: GeometryFormat::GeoJson,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Fetches the fastest driving route. Single attempt, no retries.
    pub fn fetch_route(&self, origin: Coordinate, destination: Coordinate) -> Result<Polyline> {
        let url = format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            origin.lng,
            origin.lat,
            destination.lng,
            destination.lat,
            self.config.geometries.as_param(),
        );

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmRouteResponse>())?;

        if body.code != "Ok" {
            return Err(MarketError::UpstreamUnavailable(format!(
                "OSRM answered with code {}",
                body.code
            )));
        }

        let route = body
            .routes
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::UpstreamUnavailable("OSRM returned no routes".to_string()))?;

        let polyline = route.geometry.into_polyline()?;
        if !polyline.is_routable() {
            return Err(MarketError::UpstreamUnavailable(format!(
                "OSRM geometry has {} points",
                polyline.len()
            )));
        }

        debug!(points = polyline.len(), distance_m = route.distance, "fetched OSRM route");
        Ok(polyline)
    }
}

impl RouteProvider for OsrmClient {
    fn route_for(&self, origin: Coordinate, destination: Coordinate) -> Polyline {
        match self.fetch_route(origin, destination) {
            Ok(polyline) => polyline,
            Err(err) => {
                warn!(error = %err, "routing unavailable, using straight line");
                Polyline::straight(origin, destination)
            }
        }
    }
}

/// Route provider that never calls out; every route is the straight line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineRoutes;

impl RouteProvider for StraightLineRoutes {
    fn route_for(&self, origin: Coordinate, destination: Coordinate) -> Polyline {
        Polyline::straight(origin, destination)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OsrmGeometry {
    Encoded(String),
    GeoJson { coordinates: Vec<[f64; 2]> },
}

impl OsrmGeometry {
    /// GeoJSON positions are `[lng, lat]`.
    fn into_polyline(self) -> Result<Polyline> {
        match self {
            OsrmGeometry::Encoded(encoded) => Polyline::decode(&encoded),
            OsrmGeometry::GeoJson { coordinates } => {
                let points = coordinates
                    .into_iter()
                    .map(|[lng, lat]| Coordinate::new(lat, lng))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Polyline::new(points))
            }
        }
    }
}
