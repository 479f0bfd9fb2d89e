//! Collaborator seams for the marketplace core.
//!
//! The routing service and the persistent store live outside this crate.
//! Hosts implement these traits for their own infrastructure; the crate
//! ships an OSRM route provider and an in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::Result;
use crate::geo::Coordinate;
use crate::model::{
    Match, MatchId, MatchStatus, Shipment, ShipmentId, ShipmentStatus, Trip, TripCapacityCache, TripId, UserId,
};
use crate::pricing::PriceBreakdown;
use crate::polyline::Polyline;

/// Provides a road route between two points.
///
/// Implementations must not fail: when the road geometry cannot be
/// obtained they return the straight two-point line.
pub trait RouteProvider: Send + Sync {
    fn route_for(&self, origin: Coordinate, destination: Coordinate) -> Polyline;
}

/// Everything the store needs to commit a match atomically.
#[derive(Debug, Clone)]
pub struct MatchCommit {
    pub record: Match,
    pub weight_kg: f64,
    pub volume_liters: f64,
}

/// Persistent storage for trips, shipments and matches.
pub trait MarketStore: Send + Sync {
    fn trip(&self, id: &TripId) -> Result<Option<Trip>>;
    fn shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>>;
    fn match_record(&self, id: &MatchId) -> Result<Option<Match>>;

    fn insert_trip(&self, trip: Trip) -> Result<()>;
    fn insert_shipment(&self, shipment: Shipment) -> Result<()>;

    /// Trips still accepting cargo.
    fn open_trips(&self) -> Result<Vec<Trip>>;
    /// Shipments not yet matched.
    fn open_shipments(&self) -> Result<Vec<Shipment>>;

    fn matches_for_trip(&self, id: &TripId) -> Result<Vec<Match>>;

    /// Conditionally inserts a match.
    ///
    /// Must, as one atomic step, reject the commit with a business-rule
    /// error if the pair already has an active match or if the shipment's
    /// footprint no longer fits the trip's remaining capacity, and otherwise
    /// store the match and mark the shipment as matched.
    fn commit_match(&self, commit: MatchCommit) -> Result<Match>;

    /// Moves a match out of status `from`, storing `record` and setting the
    /// shipment's status in the same step. Fails with a business-rule error
    /// if the stored match is no longer in `from`.
    fn transition_match(&self, record: Match, from: MatchStatus, shipment_status: ShipmentStatus) -> Result<Match>;

    /// Stores `price` on the shipment unless it already has one, and returns
    /// whichever price the shipment ends up with.
    fn set_price_if_absent(&self, id: &ShipmentId, price: PriceBreakdown) -> Result<PriceBreakdown>;

    fn update_trip_capacity(&self, id: &TripId, cache: TripCapacityCache) -> Result<()>;

    /// Counts (shipments, trips) on a city pair for a given day.
    fn route_demand(&self, origin_city: &str, destination_city: &str, date: NaiveDate) -> Result<(usize, usize)>;

    /// Average rating (0-5) of a user, if they have been rated.
    fn user_rating(&self, user: &UserId) -> Result<Option<f64>>;
}

impl<T: MarketStore + ?Sized> MarketStore for Arc<T> {
    fn trip(&self, id: &TripId) -> Result<Option<Trip>> {
        (**self).trip(id)
    }

    fn shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>> {
        (**self).shipment(id)
    }

    fn match_record(&self, id: &MatchId) -> Result<Option<Match>> {
        (**self).match_record(id)
    }

    fn insert_trip(&self, trip: Trip) -> Result<()> {
        (**self).insert_trip(trip)
    }

    fn insert_shipment(&self, shipment: Shipment) -> Result<()> {
        (**self).insert_shipment(shipment)
    }

    fn open_trips(&self) -> Result<Vec<Trip>> {
        (**self).open_trips()
    }

    fn open_shipments(&self) -> Result<Vec<Shipment>> {
        (**self).open_shipments()
    }

    fn matches_for_trip(&self, id: &TripId) -> Result<Vec<Match>> {
        (**self).matches_for_trip(id)
    }

    fn commit_match(&self, commit: MatchCommit) -> Result<Match> {
        (**self).commit_match(commit)
    }

    fn transition_match(&self, record: Match, from: MatchStatus, shipment_status: ShipmentStatus) -> Result<Match> {
        (**self).transition_match(record, from, shipment_status)
    }

    fn set_price_if_absent(&self, id: &ShipmentId, price: PriceBreakdown) -> Result<PriceBreakdown> {
        (**self).set_price_if_absent(id, price)
    }

    fn update_trip_capacity(&self, id: &TripId, cache: TripCapacityCache) -> Result<()> {
        (**self).update_trip_capacity(id, cache)
    }

    fn route_demand(&self, origin_city: &str, destination_city: &str, date: NaiveDate) -> Result<(usize, usize)> {
        (**self).route_demand(origin_city, destination_city, date)
    }

    fn user_rating(&self, user: &UserId) -> Result<Option<f64>> {
        (**self).user_rating(user)
    }
}
