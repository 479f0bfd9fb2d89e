//! Corridor matching against real São Paulo state geometry.

mod fixtures;

use chrono::Utc;

use freight_corridor::config::MatchingConfig;
use freight_corridor::corridor::{CorridorMatcher, MatchBasis, shipment_matches_route};
use freight_corridor::model::{Trip, TripCapacityCache, TripId, TripStatus, UserId};
use freight_corridor::polyline::Polyline;

use fixtures::*;

fn trip(from: Location, to: Location, route: Option<Polyline>) -> Trip {
    Trip {
        id: TripId::new(),
        carrier_id: UserId::new(),
        origin: from.place(),
        destination: to.place(),
        departure_date: today(),
        max_weight_kg: 500.0,
        max_volume_liters: 2000.0,
        corridor_radius_km: 10.0,
        route,
        price_per_kg: None,
        status: TripStatus::Published,
        capacity: TripCapacityCache {
            available_weight_kg: 500.0,
            available_volume_liters: 2000.0,
            utilization_percent: 0.0,
        },
        created_at: Utc::now(),
    }
}

#[test]
fn intermediate_towns_ride_along() {
    let matcher = CorridorMatcher::default();
    let trip = trip(SAO_PAULO, CAMPINAS, Some(bandeirantes_route()));

    let check = matcher.match_trip(&trip, &CAIEIRAS.place(), &VALINHOS.place());
    assert!(check.matches);
    assert_eq!(check.basis, MatchBasis::Polyline);
    // Caieiras sits ~3.4 km off the route, Valinhos is a route vertex.
    assert!(check.pickup_distance_km > 3.0 && check.pickup_distance_km < 4.0, "{:?}", check);
    assert!(check.dropoff_distance_km < 0.01, "{:?}", check);
}

#[test]
fn off_corridor_pickup_rejected() {
    let matcher = CorridorMatcher::default();
    let trip = trip(SAO_PAULO, CAMPINAS, Some(bandeirantes_route()));

    let check = matcher.match_trip(&trip, &SOROCABA.place(), &CAMPINAS.place());
    assert!(!check.matches);
    assert!(check.pickup_distance_km > 60.0);

    let check = matcher.match_trip(&trip, &JUNDIAI.place(), &ATIBAIA.place());
    assert!(!check.matches);
}

#[test]
fn reversed_direction_allowed_by_default() {
    let matcher = CorridorMatcher::default();
    let trip = trip(SAO_PAULO, CAMPINAS, Some(bandeirantes_route()));

    let check = matcher.match_trip(&trip, &VALINHOS.place(), &CAIEIRAS.place());
    assert!(check.matches);
}

#[test]
fn direction_enforced_when_configured() {
    let matcher = CorridorMatcher::new(MatchingConfig {
        enforce_direction: true,
        ..MatchingConfig::default()
    });
    let trip = trip(SAO_PAULO, CAMPINAS, Some(bandeirantes_route()));

    assert!(matcher.match_trip(&trip, &CAIEIRAS.place(), &VALINHOS.place()).matches);
    assert!(!matcher.match_trip(&trip, &VALINHOS.place(), &CAIEIRAS.place()).matches);
}

#[test]
fn same_cities_match_without_polyline() {
    let matcher = CorridorMatcher::default();
    let trip = trip(SAO_PAULO, CAMPINAS, None);

    let mut pickup = SANTOS.place();
    pickup.city = "SÃO PAULO".to_string();
    let check = matcher.match_trip(&trip, &pickup, &CAMPINAS.place());
    assert!(check.matches);
    assert_eq!(check.basis, MatchBasis::SameCities);
    assert_eq!(check.total_deviation_km, 0.0);
}

#[test]
fn endpoint_radius_without_polyline() {
    let matcher = CorridorMatcher::default();
    let trip = trip(SAO_PAULO, CAMPINAS, None);

    // Paulista is ~2.6 km from the trip origin, Valinhos ~9.6 km from Campinas.
    let check = matcher.match_trip(&trip, &PAULISTA.place(), &VALINHOS.place());
    assert!(check.matches);
    assert_eq!(check.basis, MatchBasis::Endpoints);
    assert!((check.pickup_distance_km - 2.6).abs() < 0.1);

    let check = matcher.match_trip(&trip, &PAULISTA.place(), &JUNDIAI.place());
    assert!(!check.matches);
}

#[test]
fn single_point_route_falls_back_to_cities() {
    let matcher = CorridorMatcher::default();
    let trip = trip(SAO_PAULO, CAMPINAS, Some(Polyline::new(vec![SAO_PAULO.coord()])));

    let check = matcher.match_trip(&trip, &PAULISTA.place(), &CAMPINAS.place());
    assert!(check.matches);
    assert_eq!(check.basis, MatchBasis::SameCities);
}

#[test]
fn straight_line_corridor() {
    let route = Polyline::straight(SAO_PAULO.coord(), CAMPINAS.coord());
    let check = shipment_matches_route(JUNDIAI.coord(), CAIEIRAS.coord(), route.points(), 10.0);
    assert!(check.matches);
    assert!(check.total_deviation_km < 4.0);
}
