//! Corridor matching: can a shipment ride along a trip's route, and how
//! good is the pairing.

use serde::{Deserialize, Serialize};

use crate::config::MatchingConfig;
use crate::geo::{Coordinate, haversine_km, point_to_polyline_km, route_progress};
use crate::model::{Place, ShipmentId, Trip, TripId};
use crate::pricing::PriceBreakdown;

/// What a corridor decision was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    Polyline,
    SameCities,
    Endpoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorridorCheck {
    pub matches: bool,
    pub pickup_distance_km: f64,
    pub dropoff_distance_km: f64,
    /// Sum of the pickup and dropoff distances.
    pub total_deviation_km: f64,
    pub basis: MatchBasis,
}

impl CorridorCheck {
    fn new(matches: bool, pickup_distance_km: f64, dropoff_distance_km: f64, basis: MatchBasis) -> Self {
        Self {
            matches,
            pickup_distance_km,
            dropoff_distance_km,
            total_deviation_km: pickup_distance_km + dropoff_distance_km,
            basis,
        }
    }
}

/// Distance from the route and whether it is within the radius.
pub fn in_corridor(point: Coordinate, polyline: &[Coordinate], radius_km: f64) -> (bool, f64) {
    let distance = point_to_polyline_km(point, polyline);
    (distance <= radius_km, distance)
}

/// Both ends must independently lie in the corridor. Direction along the
/// route is not checked here.
pub fn shipment_matches_route(pickup: Coordinate, dropoff: Coordinate, polyline: &[Coordinate], radius_km: f64) -> CorridorCheck {
    let (pickup_ok, pickup_distance) = in_corridor(pickup, polyline, radius_km);
    let (dropoff_ok, dropoff_distance) = in_corridor(dropoff, polyline, radius_km);
    CorridorCheck::new(pickup_ok && dropoff_ok, pickup_distance, dropoff_distance, MatchBasis::Polyline)
}

/// How a shipment's weight sits against the trip's ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFit {
    Optimal,
    Underutilized,
    NearCapacity,
}

/// Which side of the marketplace a suggestion is shown to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// A shipment for one of the carrier's trips.
    ShipmentForTrip,
    /// A trip for one of the shipper's shipments.
    TripForShipment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub trip_id: TripId,
    pub shipment_id: ShipmentId,
    pub score: f64,
    pub corridor: CorridorCheck,
    /// Non-binding estimate.
    pub estimated_price: PriceBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct CorridorMatcher {
    config: MatchingConfig,
}

impl CorridorMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Corridor decision for a shipment against a trip.
    ///
    /// Uses the trip's polyline when it has one. Without a polyline, equal
    /// origin and destination cities match outright; otherwise pickup must
    /// be near the trip's origin and dropoff near its destination.
    pub fn match_trip(&self, trip: &Trip, pickup: &Place, dropoff: &Place) -> CorridorCheck {
        let radius = trip.corridor_radius_km;

        if let Some(route) = trip.route.as_ref().filter(|route| route.is_routable()) {
            let mut check = shipment_matches_route(pickup.location, dropoff.location, route.points(), radius);
            if check.matches && self.config.enforce_direction {
                let forward = match (
                    route_progress(pickup.location, route.points()),
                    route_progress(dropoff.location, route.points()),
                ) {
                    (Some(from), Some(to)) => from <= to,
                    _ => false,
                };
                check.matches = forward;
            }
            return check;
        }

        if trip.origin.same_city(pickup) && trip.destination.same_city(dropoff) {
            return CorridorCheck::new(true, 0.0, 0.0, MatchBasis::SameCities);
        }

        let pickup_distance = haversine_km(pickup.location, trip.origin.location);
        let dropoff_distance = haversine_km(dropoff.location, trip.destination.location);
        CorridorCheck::new(
            pickup_distance <= radius && dropoff_distance <= radius,
            pickup_distance,
            dropoff_distance,
            MatchBasis::Endpoints,
        )
    }

    pub fn load_fit(&self, shipment_weight_kg: f64, trip_max_weight_kg: f64) -> LoadFit {
        let ratio = if trip_max_weight_kg > 0.0 {
            shipment_weight_kg / trip_max_weight_kg
        } else {
            f64::INFINITY
        };

        if ratio < self.config.optimal_load_min {
            LoadFit::Underutilized
        } else if ratio > self.config.optimal_load_max {
            LoadFit::NearCapacity
        } else {
            LoadFit::Optimal
        }
    }

    /// Match quality in [0, 100], rounded to one decimal.
    pub fn match_score(
        &self,
        pickup_distance_km: f64,
        dropoff_distance_km: f64,
        corridor_radius_km: f64,
        counterparty_rating: f64,
        shipment_weight_kg: f64,
        trip_max_weight_kg: f64,
    ) -> f64 {
        let cfg = &self.config;

        let avg_deviation = (pickup_distance_km + dropoff_distance_km) / 2.0;
        let distance_score = if corridor_radius_km > 0.0 {
            (1.0 - avg_deviation / corridor_radius_km) * cfg.distance_weight
        } else {
            0.0
        };

        let rating_score = (counterparty_rating.clamp(0.0, 5.0) / 5.0) * cfg.rating_weight;

        let fit_score = match self.load_fit(shipment_weight_kg, trip_max_weight_kg) {
            LoadFit::Optimal => cfg.fit_optimal_score,
            LoadFit::Underutilized => cfg.fit_underutilized_score,
            LoadFit::NearCapacity => cfg.fit_near_capacity_score,
        };

        let total = distance_score + rating_score + fit_score + cfg.base_score;
        let rounded = (total * 10.0).round() / 10.0;
        if rounded.is_nan() {
            return 0.0;
        }
        rounded.clamp(0.0, 100.0)
    }

    /// Best first, capped at the configured limit.
    pub fn rank_suggestions(&self, mut candidates: Vec<Suggestion>) -> Vec<Suggestion> {
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(self.config.suggestion_limit);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    #[test]
    fn test_in_corridor_reports_distance() {
        let line = [c(0.0, 0.0), c(0.0, 1.0)];
        let (inside, distance) = in_corridor(c(0.05, 0.5), &line, 10.0);
        assert!(inside);
        assert!((distance - 5.56).abs() < 0.05, "got {}", distance);

        let (inside, _) = in_corridor(c(0.2, 0.5), &line, 10.0);
        assert!(!inside);
    }

    #[test]
    fn test_both_ends_must_be_inside() {
        let line = [c(0.0, 0.0), c(0.0, 1.0)];
        let check = shipment_matches_route(c(0.01, 0.1), c(0.5, 0.9), &line, 10.0);
        assert!(!check.matches);
        assert!(check.pickup_distance_km < 10.0);
        assert!(check.dropoff_distance_km > 10.0);
        assert!((check.total_deviation_km - check.pickup_distance_km - check.dropoff_distance_km).abs() < 1e-12);
    }

    #[test]
    fn test_reversed_direction_accepted() {
        let line = [c(0.0, 0.0), c(0.0, 1.0)];
        let check = shipment_matches_route(c(0.01, 0.9), c(0.01, 0.1), &line, 10.0);
        assert!(check.matches);
    }

    #[test]
    fn test_match_score_reference() {
        let matcher = CorridorMatcher::default();
        // 26 (distance) + 27 (rating) + 10 (0.2 load ratio) + 10 (base)
        let score = matcher.match_score(3.0, 4.0, 10.0, 4.5, 10.0, 50.0);
        assert_eq!(score, 73.0);
    }

    #[test]
    fn test_match_score_load_bands() {
        let matcher = CorridorMatcher::default();
        assert_eq!(matcher.load_fit(10.0, 50.0), LoadFit::Underutilized);
        assert_eq!(matcher.load_fit(15.0, 50.0), LoadFit::Optimal);
        assert_eq!(matcher.load_fit(40.0, 50.0), LoadFit::Optimal);
        assert_eq!(matcher.load_fit(45.0, 50.0), LoadFit::NearCapacity);

        assert_eq!(matcher.match_score(0.0, 0.0, 10.0, 5.0, 25.0, 50.0), 100.0);
        assert_eq!(matcher.match_score(0.0, 0.0, 10.0, 5.0, 45.0, 50.0), 95.0);
    }

    #[test]
    fn test_match_score_clamps() {
        let matcher = CorridorMatcher::default();
        // Deviation far beyond the radius drives the distance part negative.
        let score = matcher.match_score(100.0, 100.0, 10.0, 0.0, 1.0, 50.0);
        assert_eq!(score, 0.0);
    }
}
