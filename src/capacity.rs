//! Per-trip capacity ledger (weight and volume).
//!
//! Capacity is always derived from the trip's active matches. The figures
//! cached on the trip are refreshed from here after every change.

use serde::{Deserialize, Serialize};

use crate::config::CapacityConfig;
use crate::model::{Match, MatchId, Shipment, ShipmentId, Trip, TripCapacityCache, TripId};

/// Whichever dimension is closer to its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitingFactor {
    Weight,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityUsage {
    pub used_weight_kg: f64,
    pub used_volume_liters: f64,
    pub max_weight_kg: f64,
    pub max_volume_liters: f64,
    pub available_weight_kg: f64,
    pub available_volume_liters: f64,
    pub weight_percent: f64,
    pub volume_percent: f64,
    /// Max of the two percentages.
    pub combined_utilization: f64,
    pub limiting_factor: LimitingFactor,
    pub is_full: bool,
}

impl CapacityUsage {
    pub fn cache(&self) -> TripCapacityCache {
        TripCapacityCache {
            available_weight_kg: self.available_weight_kg,
            available_volume_liters: self.available_volume_liters,
            utilization_percent: self.combined_utilization,
        }
    }
}

/// Outcome of a fit check. `reason` names the violated dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitCheck {
    pub fits: bool,
    pub reason: Option<String>,
}

/// Footprint of one shipment riding on a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedLoad {
    pub match_id: MatchId,
    pub shipment_id: ShipmentId,
    pub weight_kg: f64,
    pub volume_liters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCapacityStatus {
    pub trip_id: TripId,
    pub usage: CapacityUsage,
    pub loads: Vec<MatchedLoad>,
}

impl TripCapacityStatus {
    pub fn fits(&self, weight_kg: f64, volume_liters: f64) -> FitCheck {
        fits(
            weight_kg,
            volume_liters,
            self.usage.available_weight_kg,
            self.usage.available_volume_liters,
        )
    }
}

fn percent(used: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 100.0;
    }
    used / max * 100.0
}

/// Checks a shipment against the remaining capacity. Weight is checked
/// before volume.
pub fn fits(weight_kg: f64, volume_liters: f64, available_weight_kg: f64, available_volume_liters: f64) -> FitCheck {
    if weight_kg > available_weight_kg {
        return FitCheck {
            fits: false,
            reason: Some(format!(
                "Shipment weight ({:.2} kg) exceeds available weight capacity ({:.2} kg)",
                weight_kg, available_weight_kg
            )),
        };
    }
    if volume_liters > available_volume_liters {
        return FitCheck {
            fits: false,
            reason: Some(format!(
                "Shipment volume ({:.2} L) exceeds available volume capacity ({:.2} L)",
                volume_liters, available_volume_liters
            )),
        };
    }
    FitCheck {
        fits: true,
        reason: None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapacityLedger {
    config: CapacityConfig,
}

impl CapacityLedger {
    pub fn new(config: CapacityConfig) -> Self {
        Self { config }
    }

    pub fn usage(&self, used_weight_kg: f64, used_volume_liters: f64, max_weight_kg: f64, max_volume_liters: f64) -> CapacityUsage {
        let weight_percent = percent(used_weight_kg, max_weight_kg);
        let volume_percent = percent(used_volume_liters, max_volume_liters);
        let combined_utilization = weight_percent.max(volume_percent);

        let limiting_factor = if weight_percent >= volume_percent {
            LimitingFactor::Weight
        } else {
            LimitingFactor::Volume
        };

        CapacityUsage {
            used_weight_kg,
            used_volume_liters,
            max_weight_kg,
            max_volume_liters,
            available_weight_kg: (max_weight_kg - used_weight_kg).max(0.0),
            available_volume_liters: (max_volume_liters - used_volume_liters).max(0.0),
            weight_percent,
            volume_percent,
            combined_utilization,
            limiting_factor,
            is_full: combined_utilization >= self.config.full_threshold_percent,
        }
    }

    /// Sums the footprints of the trip's active matches.
    ///
    /// `matched` pairs each match with its shipment; matches for other trips
    /// and terminal matches are ignored.
    pub fn trip_status(&self, trip: &Trip, matched: &[(Match, Shipment)]) -> TripCapacityStatus {
        let loads: Vec<MatchedLoad> = matched
            .iter()
            .filter(|(record, _)| record.trip_id == trip.id && record.status.is_active())
            .map(|(record, shipment)| MatchedLoad {
                match_id: record.id,
                shipment_id: shipment.id,
                weight_kg: shipment.weight_kg(),
                volume_liters: shipment.volume_liters(),
            })
            .collect();

        let used_weight: f64 = loads.iter().map(|load| load.weight_kg).sum();
        let used_volume: f64 = loads.iter().map(|load| load.volume_liters).sum();

        TripCapacityStatus {
            trip_id: trip.id,
            usage: self.usage(used_weight, used_volume, trip.max_weight_kg, trip.max_volume_liters),
            loads,
        }
    }
}
