//! In-memory `MarketStore`.
//!
//! A single lock guards all records, so `commit_match` checks and writes
//! in one critical section.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::warn;

use crate::capacity::{CapacityLedger, fits};
use crate::error::{MarketError, Result};
use crate::model::{
    Match, MatchId, MatchStatus, Shipment, ShipmentId, ShipmentStatus, Trip, TripCapacityCache, TripId, TripStatus,
    UserId, same_city_name,
};
use crate::pricing::PriceBreakdown;
use crate::traits::{MarketStore, MatchCommit};

#[derive(Debug, Default)]
struct Records {
    trips: HashMap<TripId, Trip>,
    shipments: HashMap<ShipmentId, Shipment>,
    matches: HashMap<MatchId, Match>,
    ratings: HashMap<UserId, f64>,
}

impl Records {
    fn active_load(&self, trip_id: &TripId) -> (f64, f64) {
        self.matches
            .values()
            .filter(|record| record.trip_id == *trip_id && record.status.is_active())
            .filter_map(|record| self.shipments.get(&record.shipment_id))
            .fold((0.0, 0.0), |(weight, volume), shipment| {
                (weight + shipment.weight_kg(), volume + shipment.volume_liters())
            })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    ledger: CapacityLedger,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user_rating(&self, user: UserId, rating: f64) {
        self.records.write().ratings.insert(user, rating);
    }
}

impl MarketStore for MemoryStore {
    fn trip(&self, id: &TripId) -> Result<Option<Trip>> {
        Ok(self.records.read().trips.get(id).cloned())
    }

    fn shipment(&self, id: &ShipmentId) -> Result<Option<Shipment>> {
        Ok(self.records.read().shipments.get(id).cloned())
    }

    fn match_record(&self, id: &MatchId) -> Result<Option<Match>> {
        Ok(self.records.read().matches.get(id).cloned())
    }

    fn insert_trip(&self, trip: Trip) -> Result<()> {
        self.records.write().trips.insert(trip.id, trip);
        Ok(())
    }

    fn insert_shipment(&self, shipment: Shipment) -> Result<()> {
        self.records.write().shipments.insert(shipment.id, shipment);
        Ok(())
    }

    fn open_trips(&self) -> Result<Vec<Trip>> {
        let mut trips: Vec<Trip> = self
            .records
            .read()
            .trips
            .values()
            .filter(|trip| trip.status.accepts_cargo())
            .cloned()
            .collect();
        trips.sort_by_key(|trip| (trip.created_at, trip.id));
        Ok(trips)
    }

    fn open_shipments(&self) -> Result<Vec<Shipment>> {
        let mut shipments: Vec<Shipment> = self
            .records
            .read()
            .shipments
            .values()
            .filter(|shipment| shipment.status == ShipmentStatus::Pending)
            .cloned()
            .collect();
        shipments.sort_by_key(|shipment| (shipment.created_at, shipment.id));
        Ok(shipments)
    }

    fn matches_for_trip(&self, id: &TripId) -> Result<Vec<Match>> {
        let mut matches: Vec<Match> = self
            .records
            .read()
            .matches
            .values()
            .filter(|record| record.trip_id == *id)
            .cloned()
            .collect();
        matches.sort_by_key(|record| (record.created_at, record.id));
        Ok(matches)
    }

    fn commit_match(&self, commit: MatchCommit) -> Result<Match> {
        let mut records = self.records.write();
        let record = commit.record;

        let trip = records
            .trips
            .get(&record.trip_id)
            .ok_or_else(|| MarketError::not_found("trip", record.trip_id))?;
        let (max_weight, max_volume) = (trip.max_weight_kg, trip.max_volume_liters);

        let duplicate = records.matches.values().any(|existing| {
            existing.trip_id == record.trip_id
                && existing.shipment_id == record.shipment_id
                && existing.status.is_active()
        });
        if duplicate {
            return Err(MarketError::BusinessRule(
                "Shipment is already matched to this trip".to_string(),
            ));
        }

        let shipment = records
            .shipments
            .get(&record.shipment_id)
            .ok_or_else(|| MarketError::not_found("shipment", record.shipment_id))?;
        if shipment.status != ShipmentStatus::Pending {
            return Err(MarketError::BusinessRule(
                "Shipment is no longer open for matching".to_string(),
            ));
        }

        let (used_weight, used_volume) = records.active_load(&record.trip_id);
        let usage = self.ledger.usage(used_weight, used_volume, max_weight, max_volume);
        let check = fits(
            commit.weight_kg,
            commit.volume_liters,
            usage.available_weight_kg,
            usage.available_volume_liters,
        );
        if !check.fits {
            warn!(trip_id = %record.trip_id, shipment_id = %record.shipment_id, "rejected match commit");
            return Err(MarketError::BusinessRule(
                check.reason.unwrap_or_else(|| "Shipment does not fit the trip".to_string()),
            ));
        }

        if let Some(shipment) = records.shipments.get_mut(&record.shipment_id) {
            shipment.status = ShipmentStatus::Matched;
        }
        records.matches.insert(record.id, record.clone());
        Ok(record)
    }

    fn transition_match(&self, record: Match, from: MatchStatus, shipment_status: ShipmentStatus) -> Result<Match> {
        let mut records = self.records.write();

        let current = records
            .matches
            .get(&record.id)
            .ok_or_else(|| MarketError::not_found("match", record.id))?
            .status;
        if current != from {
            warn!(match_id = %record.id, ?current, ?from, "rejected stale match transition");
            return Err(MarketError::BusinessRule(format!(
                "Match is no longer {:?} (now {:?})",
                from, current
            )));
        }

        let shipment = records
            .shipments
            .get_mut(&record.shipment_id)
            .ok_or_else(|| MarketError::not_found("shipment", record.shipment_id))?;
        shipment.status = shipment_status;
        records.matches.insert(record.id, record.clone());
        Ok(record)
    }

    fn set_price_if_absent(&self, id: &ShipmentId, price: PriceBreakdown) -> Result<PriceBreakdown> {
        let mut records = self.records.write();
        let shipment = records
            .shipments
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("shipment", id))?;
        Ok(shipment.price.get_or_insert(price).clone())
    }

    fn update_trip_capacity(&self, id: &TripId, cache: TripCapacityCache) -> Result<()> {
        let mut records = self.records.write();
        let trip = records
            .trips
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("trip", id))?;
        trip.capacity = cache;
        Ok(())
    }

    fn route_demand(&self, origin_city: &str, destination_city: &str, date: NaiveDate) -> Result<(usize, usize)> {
        let records = self.records.read();

        let shipments = records
            .shipments
            .values()
            .filter(|shipment| shipment.status != ShipmentStatus::Cancelled)
            .filter(|shipment| shipment.created_at.date_naive() == date)
            .filter(|shipment| {
                same_city_name(&shipment.origin.city, origin_city)
                    && same_city_name(&shipment.destination.city, destination_city)
            })
            .count();

        let trips = records
            .trips
            .values()
            .filter(|trip| matches!(trip.status, TripStatus::Published | TripStatus::InProgress))
            .filter(|trip| trip.departure_date == date)
            .filter(|trip| {
                same_city_name(&trip.origin.city, origin_city)
                    && same_city_name(&trip.destination.city, destination_city)
            })
            .count();

        Ok((shipments, trips))
    }

    fn user_rating(&self, user: &UserId) -> Result<Option<f64>> {
        Ok(self.records.read().ratings.get(user).copied())
    }
}
