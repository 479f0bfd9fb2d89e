//! Real São Paulo state locations for realistic test fixtures.
//!
//! The corridor runs from central São Paulo to Campinas through Perus,
//! Jundiaí and Valinhos, roughly following the Bandeirantes highway.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};

use freight_corridor::cargo::{CargoCategory, CargoDimensions};
use freight_corridor::geo::Coordinate;
use freight_corridor::model::{NewShipment, NewTrip, Place, UserId};
use freight_corridor::polyline::Polyline;

/// A named location with coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coord(&self) -> Coordinate {
        Coordinate { lat: self.lat, lng: self.lng }
    }

    pub fn place(&self) -> Place {
        Place::new(self.name, self.lat, self.lng)
    }
}

pub const SAO_PAULO: Location = Location::new("São Paulo", -23.5505, -46.6333);
pub const PAULISTA: Location = Location::new("São Paulo", -23.5614, -46.6559);
pub const PERUS: Location = Location::new("Perus", -23.4045, -46.7536);
pub const CAIEIRAS: Location = Location::new("Caieiras", -23.3645, -46.7406);
pub const JUNDIAI: Location = Location::new("Jundiaí", -23.1857, -46.8978);
pub const VALINHOS: Location = Location::new("Valinhos", -22.9706, -46.9958);
pub const CAMPINAS: Location = Location::new("Campinas", -22.9099, -47.0626);
pub const SOROCABA: Location = Location::new("Sorocaba", -23.5015, -47.4526);
pub const ATIBAIA: Location = Location::new("Atibaia", -23.1171, -46.5563);
pub const SANTOS: Location = Location::new("Santos", -23.9608, -46.3336);

/// Road-like route São Paulo -> Campinas.
pub fn bandeirantes_route() -> Polyline {
    Polyline::new(
        [SAO_PAULO, PERUS, JUNDIAI, VALINHOS, CAMPINAS]
            .iter()
            .map(Location::coord)
            .collect(),
    )
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn trip_request(carrier: UserId, from: Location, to: Location, max_weight_kg: f64) -> NewTrip {
    NewTrip {
        carrier_id: carrier,
        origin: from.place(),
        destination: to.place(),
        departure_date: today(),
        max_weight_kg,
        max_volume_liters: 2000.0,
        corridor_radius_km: Some(10.0),
        price_per_kg: None,
    }
}

/// A 30x20x10 cm parcel (6 L) of the given weight.
pub fn parcel(shipper: UserId, from: Location, to: Location, weight_kg: f64) -> NewShipment {
    NewShipment {
        shipper_id: shipper,
        origin: from.place(),
        destination: to.place(),
        dimensions: CargoDimensions {
            length_cm: 30.0,
            width_cm: 20.0,
            height_cm: 10.0,
            weight_kg,
        },
        category: None,
        declared_value: 150.0,
    }
}

pub fn with_category(mut request: NewShipment, category: CargoCategory) -> NewShipment {
    request.category = Some(category);
    request
}
