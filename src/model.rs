//! Marketplace records: trips, shipments and the matches between them.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cargo::{CargoCategory, CargoDimensions};
use crate::error::{MarketError, Result};
use crate::geo::Coordinate;
use crate::polyline::Polyline;
use crate::pricing::PriceBreakdown;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(TripId);
id_type!(ShipmentId);
id_type!(MatchId);
id_type!(UserId);

/// A named point: city label plus coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub city: String,
    pub location: Coordinate,
}

impl Place {
    pub fn new(city: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            city: city.into(),
            location: Coordinate { lat, lng },
        }
    }

    pub fn same_city(&self, other: &Place) -> bool {
        same_city_name(&self.city, &other.city)
    }
}

/// Case-insensitive, whitespace-trimmed city comparison. Blank names never
/// match.
pub fn same_city_name(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Published,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn accepts_cargo(&self) -> bool {
        matches!(self, TripStatus::Published)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Matched,
    InTransit,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Confirmed,
    PickedUp,
    Delivered,
    Cancelled,
}

impl MatchStatus {
    /// Non-terminal matches hold capacity on their trip.
    pub fn is_active(&self) -> bool {
        matches!(self, MatchStatus::Confirmed | MatchStatus::PickedUp)
    }
}

/// Display cache of a trip's remaining capacity. The ledger computed from
/// the trip's matches is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripCapacityCache {
    pub available_weight_kg: f64,
    pub available_volume_liters: f64,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub carrier_id: UserId,
    pub origin: Place,
    pub destination: Place,
    pub departure_date: NaiveDate,
    pub max_weight_kg: f64,
    pub max_volume_liters: f64,
    pub corridor_radius_km: f64,
    pub route: Option<Polyline>,
    /// Per-kilogram rate from before dynamic pricing; informational only.
    pub price_per_kg: Option<f64>,
    pub status: TripStatus,
    pub capacity: TripCapacityCache,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub shipper_id: UserId,
    pub origin: Place,
    pub destination: Place,
    pub dimensions: CargoDimensions,
    pub category: CargoCategory,
    pub declared_value: f64,
    pub status: ShipmentStatus,
    /// Binding price fixed at creation. `None` only for shipments created
    /// before prices were persisted.
    pub price: Option<PriceBreakdown>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn weight_kg(&self) -> f64 {
        self.dimensions.weight_kg
    }

    pub fn volume_liters(&self) -> f64 {
        self.dimensions.volume_liters()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub trip_id: TripId,
    pub shipment_id: ShipmentId,
    pub carrier_id: UserId,
    pub shipper_id: UserId,
    pub status: MatchStatus,
    /// Copied verbatim from the shipment; never recalculated.
    pub price: PriceBreakdown,
    pub created_at: DateTime<Utc>,
    pub pickup_confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Request to publish a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrip {
    pub carrier_id: UserId,
    pub origin: Place,
    pub destination: Place,
    pub departure_date: NaiveDate,
    pub max_weight_kg: f64,
    pub max_volume_liters: f64,
    pub corridor_radius_km: Option<f64>,
    pub price_per_kg: Option<f64>,
}

impl NewTrip {
    pub fn validate(&self) -> Result<()> {
        self.origin.location.validate()?;
        self.destination.location.validate()?;
        for (name, value) in [
            ("max_weight_kg", self.max_weight_kg),
            ("max_volume_liters", self.max_volume_liters),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MarketError::Validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if let Some(radius) = self.corridor_radius_km {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(MarketError::Validation(format!(
                    "corridor radius must be positive, got {}",
                    radius
                )));
            }
        }
        Ok(())
    }
}

/// Request to publish a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShipment {
    pub shipper_id: UserId,
    pub origin: Place,
    pub destination: Place,
    pub dimensions: CargoDimensions,
    pub category: Option<CargoCategory>,
    pub declared_value: f64,
}

impl NewShipment {
    pub fn validate(&self) -> Result<()> {
        self.origin.location.validate()?;
        self.destination.location.validate()?;
        self.dimensions.validate()?;
        if !self.declared_value.is_finite() || self.declared_value < 0.0 {
            return Err(MarketError::Validation(format!(
                "declared value must not be negative, got {}",
                self.declared_value
            )));
        }
        Ok(())
    }
}
