//! Match orchestration: publishing trips and shipments, creating matches,
//! and building ranked suggestions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::capacity::{CapacityLedger, TripCapacityStatus};
use crate::cargo::CargoCategory;
use crate::config::MarketConfig;
use crate::corridor::{CorridorMatcher, Suggestion, SuggestionKind};
use crate::error::{MarketError, Result};
use crate::geo::haversine_km;
use crate::model::{
    Match, MatchId, MatchStatus, NewShipment, NewTrip, Shipment, ShipmentId, ShipmentStatus, Trip, TripId,
    TripStatus, UserId,
};
use crate::pricing::{CargoSpec, DemandSnapshot, PriceBreakdown, PriceSource, PricingContext, PricingEngine};
use crate::traits::{MarketStore, MatchCommit, RouteProvider};

pub struct MatchOrchestrator<S, R> {
    store: S,
    routes: R,
    config: MarketConfig,
    ledger: CapacityLedger,
    matcher: CorridorMatcher,
    pricing: PricingEngine,
    trip_leases: Mutex<HashMap<TripId, Arc<Mutex<()>>>>,
}

impl<S, R> MatchOrchestrator<S, R>
where
    S: MarketStore,
    R: RouteProvider,
{
    pub fn new(store: S, routes: R, config: MarketConfig) -> Self {
        Self {
            ledger: CapacityLedger::new(config.capacity.clone()),
            matcher: CorridorMatcher::new(config.matching.clone()),
            pricing: PricingEngine::new(config.pricing.clone()),
            store,
            routes,
            config,
            trip_leases: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn matcher(&self) -> &CorridorMatcher {
        &self.matcher
    }

    /// Runs `work` while holding the trip's lease, so capacity-changing work
    /// on one trip is serialized. The lease entry is dropped once nobody else
    /// holds or waits on it.
    fn with_trip_lease<T>(&self, id: &TripId, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let lease = self
            .trip_leases
            .lock()
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let outcome = {
            let _guard = lease.lock();
            work()
        };

        let mut leases = self.trip_leases.lock();
        // One reference in the table, one here.
        if Arc::strong_count(&lease) == 2 {
            leases.remove(id);
        }
        outcome
    }

    fn load_trip(&self, id: &TripId) -> Result<Trip> {
        self.store.trip(id)?.ok_or_else(|| MarketError::not_found("trip", id))
    }

    fn load_shipment(&self, id: &ShipmentId) -> Result<Shipment> {
        self.store
            .shipment(id)?
            .ok_or_else(|| MarketError::not_found("shipment", id))
    }

    fn load_match(&self, id: &MatchId) -> Result<Match> {
        self.store
            .match_record(id)?
            .ok_or_else(|| MarketError::not_found("match", id))
    }

    /// Publishes a trip. The route polyline is fetched once here.
    pub fn publish_trip(&self, request: NewTrip) -> Result<Trip> {
        request.validate()?;

        let route = self
            .routes
            .route_for(request.origin.location, request.destination.location);
        let corridor_radius_km = request
            .corridor_radius_km
            .unwrap_or(self.config.capacity.default_corridor_radius_km);
        let usage = self
            .ledger
            .usage(0.0, 0.0, request.max_weight_kg, request.max_volume_liters);

        let trip = Trip {
            id: TripId::new(),
            carrier_id: request.carrier_id,
            origin: request.origin,
            destination: request.destination,
            departure_date: request.departure_date,
            max_weight_kg: request.max_weight_kg,
            max_volume_liters: request.max_volume_liters,
            corridor_radius_km,
            route: Some(route),
            price_per_kg: request.price_per_kg,
            status: TripStatus::Published,
            capacity: usage.cache(),
            created_at: Utc::now(),
        };

        self.store.insert_trip(trip.clone())?;
        info!(
            trip_id = %trip.id,
            origin = %trip.origin.city,
            destination = %trip.destination.city,
            "published trip"
        );
        Ok(trip)
    }

    /// Binding price for a shipment about to be published. Must be called
    /// exactly once per shipment.
    pub fn create_shipment_price(&self, request: &NewShipment, category: CargoCategory) -> Result<PriceBreakdown> {
        let distance_km = haversine_km(request.origin.location, request.destination.location);
        let (shipments, trips) = self.store.route_demand(
            &request.origin.city,
            &request.destination.city,
            Utc::now().date_naive(),
        )?;

        let context = PricingContext {
            corridor_radius_km: self.config.capacity.default_corridor_radius_km,
            demand: DemandSnapshot { shipments, trips },
            ..PricingContext::default()
        };

        self.pricing
            .price_for_shipment(distance_km, &request.dimensions, category, &context)
    }

    /// Publishes a shipment with its binding price.
    pub fn publish_shipment(&self, request: NewShipment) -> Result<Shipment> {
        request.validate()?;

        let category = self
            .pricing
            .config()
            .categories
            .resolve(request.category, &request.dimensions)?;
        let price = self.create_shipment_price(&request, category)?;
        let total_price = price.total_price;

        let shipment = Shipment {
            id: ShipmentId::new(),
            shipper_id: request.shipper_id,
            origin: request.origin,
            destination: request.destination,
            dimensions: request.dimensions,
            category,
            declared_value: request.declared_value,
            status: ShipmentStatus::Pending,
            price: Some(price),
            created_at: Utc::now(),
        };

        self.store.insert_shipment(shipment.clone())?;
        info!(
            shipment_id = %shipment.id,
            category = %category,
            total_price,
            "published shipment"
        );
        Ok(shipment)
    }

    /// Non-binding estimate. Never stores anything.
    pub fn quote_price(&self, distance_km: f64, cargo: &CargoSpec, context: &PricingContext) -> PriceBreakdown {
        self.pricing.quote(distance_km, cargo, context)
    }

    /// Capacity snapshot computed from the trip's matches.
    pub fn trip_capacity_status(&self, trip_id: &TripId) -> Result<TripCapacityStatus> {
        let trip = self.load_trip(trip_id)?;
        self.capacity_of(&trip)
    }

    fn capacity_of(&self, trip: &Trip) -> Result<TripCapacityStatus> {
        let mut matched = Vec::new();
        for record in self.store.matches_for_trip(&trip.id)? {
            if !record.status.is_active() {
                continue;
            }
            let shipment = self.load_shipment(&record.shipment_id)?;
            matched.push((record, shipment));
        }
        Ok(self.ledger.trip_status(trip, &matched))
    }

    /// Recomputes the ledger and refreshes the trip's cached figures.
    fn refresh_capacity(&self, trip_id: &TripId) -> Result<TripCapacityStatus> {
        let status = self.trip_capacity_status(trip_id)?;
        self.store.update_trip_capacity(trip_id, status.usage.cache())?;
        Ok(status)
    }

    /// Prices a shipment that predates stored prices. Only the first price
    /// stored on the shipment counts; a concurrent caller gets that one back.
    fn legacy_price(&self, trip: &Trip, shipment: &Shipment, status: &TripCapacityStatus) -> Result<PriceBreakdown> {
        let corridor = self.matcher.match_trip(trip, &shipment.origin, &shipment.destination);
        let (shipments, trips) = self.store.route_demand(
            &shipment.origin.city,
            &shipment.destination.city,
            shipment.created_at.date_naive(),
        )?;
        let context = PricingContext {
            deviation_km: corridor.total_deviation_km,
            corridor_radius_km: trip.corridor_radius_km,
            trip_usage_percent: status.usage.combined_utilization,
            last_slot: false,
            demand: DemandSnapshot { shipments, trips },
        };

        let distance_km = haversine_km(shipment.origin.location, shipment.destination.location);
        let computed = self
            .pricing
            .price_for_shipment(distance_km, &shipment.dimensions, shipment.category, &context)?
            .with_source(PriceSource::LegacyComputed);

        let price = self.store.set_price_if_absent(&shipment.id, computed)?;
        warn!(shipment_id = %shipment.id, source = ?price.source, "priced legacy shipment at match time");
        Ok(price)
    }

    /// Creates a match between a trip and a shipment.
    ///
    /// The price is the shipment's stored breakdown, copied as is.
    pub fn create_match(&self, trip_id: &TripId, shipment_id: &ShipmentId) -> Result<Match> {
        self.with_trip_lease(trip_id, || self.attach(trip_id, shipment_id))
    }

    fn attach(&self, trip_id: &TripId, shipment_id: &ShipmentId) -> Result<Match> {
        let trip = self.load_trip(trip_id)?;
        let shipment = self.load_shipment(shipment_id)?;

        if !trip.status.accepts_cargo() {
            return Err(MarketError::BusinessRule(
                "Trip is no longer accepting cargo".to_string(),
            ));
        }

        let status = self.capacity_of(&trip)?;
        let check = status.fits(shipment.weight_kg(), shipment.volume_liters());
        if !check.fits {
            return Err(MarketError::BusinessRule(
                check.reason.unwrap_or_else(|| "Shipment does not fit the trip".to_string()),
            ));
        }

        let price = match shipment.price.clone() {
            Some(price) => price,
            None => self.legacy_price(&trip, &shipment, &status)?,
        };

        let record = Match {
            id: MatchId::new(),
            trip_id: trip.id,
            shipment_id: shipment.id,
            carrier_id: trip.carrier_id,
            shipper_id: shipment.shipper_id,
            status: MatchStatus::Confirmed,
            price,
            created_at: Utc::now(),
            pickup_confirmed_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        let record = self.store.commit_match(MatchCommit {
            record,
            weight_kg: shipment.weight_kg(),
            volume_liters: shipment.volume_liters(),
        })?;
        let after = self.refresh_capacity(trip_id)?;

        info!(
            match_id = %record.id,
            trip_id = %trip.id,
            shipment_id = %shipment.id,
            total_price = record.price.total_price,
            utilization = after.usage.combined_utilization,
            "created match"
        );
        Ok(record)
    }

    /// Detaches a match that has not been picked up yet.
    pub fn cancel_match(&self, match_id: &MatchId) -> Result<Match> {
        let record = self.transition(match_id, MatchStatus::Confirmed, "cancelled", |record| {
            record.status = MatchStatus::Cancelled;
            record.cancelled_at = Some(Utc::now());
            ShipmentStatus::Pending
        })?;
        info!(match_id = %record.id, trip_id = %record.trip_id, "cancelled match");
        Ok(record)
    }

    pub fn confirm_pickup(&self, match_id: &MatchId) -> Result<Match> {
        let record = self.transition(match_id, MatchStatus::Confirmed, "picked up", |record| {
            record.status = MatchStatus::PickedUp;
            record.pickup_confirmed_at = Some(Utc::now());
            ShipmentStatus::InTransit
        })?;
        info!(match_id = %record.id, "confirmed pickup");
        Ok(record)
    }

    /// Marks the shipment delivered, releasing its capacity on the trip.
    pub fn confirm_delivery(&self, match_id: &MatchId) -> Result<Match> {
        let record = self.transition(match_id, MatchStatus::PickedUp, "delivered", |record| {
            record.status = MatchStatus::Delivered;
            record.delivered_at = Some(Utc::now());
            ShipmentStatus::Delivered
        })?;
        info!(match_id = %record.id, "confirmed delivery");
        Ok(record)
    }

    /// Applies one lifecycle step under the trip lease. The match is re-read
    /// under the lease and the store rejects the write if another process
    /// moved it in the meantime.
    fn transition(
        &self,
        match_id: &MatchId,
        from: MatchStatus,
        action: &str,
        apply: impl FnOnce(&mut Match) -> ShipmentStatus,
    ) -> Result<Match> {
        let trip_id = self.load_match(match_id)?.trip_id;

        self.with_trip_lease(&trip_id, || {
            let mut record = self.load_match(match_id)?;
            if record.status != from {
                return Err(MarketError::BusinessRule(format!(
                    "Match cannot be {} in status {:?}",
                    action, record.status
                )));
            }

            let shipment_status = apply(&mut record);
            let record = self.store.transition_match(record, from, shipment_status)?;
            self.refresh_capacity(&trip_id)?;
            Ok(record)
        })
    }

    /// Ranked pairings for a user's open trips and shipments against the
    /// other side's open inventory. Prices are estimates only.
    pub fn suggestions_for(&self, user_id: &UserId) -> Result<Vec<Suggestion>> {
        let trips = self.store.open_trips()?;
        let shipments = self.store.open_shipments()?;

        let mut candidates: Vec<(&Trip, &Shipment, SuggestionKind)> = Vec::new();
        for trip in trips.iter().filter(|trip| trip.carrier_id == *user_id) {
            for shipment in shipments.iter().filter(|s| s.shipper_id != *user_id) {
                candidates.push((trip, shipment, SuggestionKind::ShipmentForTrip));
            }
        }
        for shipment in shipments.iter().filter(|s| s.shipper_id == *user_id) {
            for trip in trips.iter().filter(|trip| trip.carrier_id != *user_id) {
                candidates.push((trip, shipment, SuggestionKind::TripForShipment));
            }
        }

        let mut statuses: HashMap<TripId, TripCapacityStatus> = HashMap::new();
        let mut counterparties: HashSet<UserId> = HashSet::new();
        for (trip, shipment, kind) in &candidates {
            if !statuses.contains_key(&trip.id) {
                statuses.insert(trip.id, self.capacity_of(trip)?);
            }
            counterparties.insert(match kind {
                SuggestionKind::ShipmentForTrip => shipment.shipper_id,
                SuggestionKind::TripForShipment => trip.carrier_id,
            });
        }

        let mut ratings: HashMap<UserId, f64> = HashMap::new();
        for user in counterparties {
            if let Some(rating) = self.store.user_rating(&user)? {
                ratings.insert(user, rating);
            }
        }

        let evaluated: Vec<Option<Suggestion>> = candidates
            .par_iter()
            .map(|(trip, shipment, kind)| {
                let status = statuses
                    .get(&trip.id)
                    .ok_or_else(|| MarketError::not_found("trip", trip.id))?;
                let counterparty = match kind {
                    SuggestionKind::ShipmentForTrip => shipment.shipper_id,
                    SuggestionKind::TripForShipment => trip.carrier_id,
                };
                let rating = ratings
                    .get(&counterparty)
                    .copied()
                    .unwrap_or(self.config.matching.default_rating);
                self.evaluate(trip, shipment, *kind, status, rating)
            })
            .collect::<Result<Vec<_>>>()?;

        let ranked = self
            .matcher
            .rank_suggestions(evaluated.into_iter().flatten().collect());
        debug!(user_id = %user_id, count = ranked.len(), "built suggestions");
        Ok(ranked)
    }

    fn evaluate(
        &self,
        trip: &Trip,
        shipment: &Shipment,
        kind: SuggestionKind,
        status: &TripCapacityStatus,
        rating: f64,
    ) -> Result<Option<Suggestion>> {
        let (weight, volume) = (shipment.weight_kg(), shipment.volume_liters());
        if !status.fits(weight, volume).fits {
            return Ok(None);
        }

        let corridor = self
            .matcher
            .match_trip(trip, &shipment.origin, &shipment.destination);
        if !corridor.matches {
            return Ok(None);
        }

        let score = self.matcher.match_score(
            corridor.pickup_distance_km,
            corridor.dropoff_distance_km,
            trip.corridor_radius_km,
            rating,
            weight,
            trip.max_weight_kg,
        );

        let (shipments, trips) = self.store.route_demand(
            &shipment.origin.city,
            &shipment.destination.city,
            shipment.created_at.date_naive(),
        )?;
        let usage = &status.usage;
        let after = self.ledger.usage(
            usage.used_weight_kg + weight,
            usage.used_volume_liters + volume,
            usage.max_weight_kg,
            usage.max_volume_liters,
        );
        let context = PricingContext {
            deviation_km: corridor.total_deviation_km,
            corridor_radius_km: trip.corridor_radius_km,
            trip_usage_percent: usage.combined_utilization,
            last_slot: after.is_full,
            demand: DemandSnapshot { shipments, trips },
        };
        let distance_km = haversine_km(shipment.origin.location, shipment.destination.location);
        let cargo = CargoSpec::from_dimensions(&shipment.dimensions, shipment.category);

        Ok(Some(Suggestion {
            kind,
            trip_id: trip.id,
            shipment_id: shipment.id,
            score,
            corridor,
            estimated_price: self.pricing.quote(distance_km, &cargo, &context),
        }))
    }
}
