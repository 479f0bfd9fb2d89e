//! Dynamic pricing engine.
//!
//! A shipment's binding price is computed once, when it is published, and
//! stored on the shipment. Matches copy it verbatim. `quote` runs the same
//! formula for non-binding estimates and never touches stored records.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cargo::{CargoCategory, CargoDimensions, chargeable_weight_kg};
use crate::config::PricingConfig;
use crate::error::Result;

/// Where a stored price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Computed when the shipment was published.
    Persisted,
    /// Computed at match time for a shipment that predates stored prices.
    LegacyComputed,
    /// Non-binding estimate.
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    pub category: f64,
    pub deviation: f64,
    pub capacity: f64,
    pub demand: f64,
    pub weight: f64,
}

impl Multipliers {
    pub fn product(&self) -> f64 {
        self.category * self.deviation * self.capacity * self.demand * self.weight
    }
}

/// Same-day, same-route market counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandSnapshot {
    pub shipments: usize,
    pub trips: usize,
}

/// Trip and market state a price depends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingContext {
    pub deviation_km: f64,
    pub corridor_radius_km: f64,
    /// Combined utilization of the trip before this shipment, in percent.
    pub trip_usage_percent: f64,
    pub last_slot: bool,
    pub demand: DemandSnapshot,
}

impl Default for PricingContext {
    fn default() -> Self {
        Self {
            deviation_km: 0.0,
            corridor_radius_km: 10.0,
            trip_usage_percent: 0.0,
            last_slot: false,
            demand: DemandSnapshot::default(),
        }
    }
}

/// What is being priced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CargoSpec {
    pub weight_kg: f64,
    pub volume_liters: f64,
    pub category: CargoCategory,
}

impl CargoSpec {
    pub fn from_dimensions(dims: &CargoDimensions, category: CargoCategory) -> Self {
        Self {
            weight_kg: dims.weight_kg,
            volume_liters: dims.volume_liters(),
            category,
        }
    }
}

/// Immutable result of pricing a shipment.
///
/// `total_price == carrier_earnings + platform_commission` to the cent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub total_price: f64,
    pub carrier_earnings: f64,
    pub platform_commission: f64,
    pub commission_rate: f64,
    pub distance_km: f64,
    pub base_price: f64,
    pub chargeable_weight_kg: f64,
    pub category: CargoCategory,
    pub multipliers: Multipliers,
    pub source: PriceSource,
}

impl PriceBreakdown {
    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Piecewise-linear base price for a distance.
    pub fn distance_tier_price(&self, distance_km: f64) -> f64 {
        if distance_km <= 0.0 || !distance_km.is_finite() {
            return self.config.zero_distance_price;
        }

        let tier = self
            .config
            .distance_tiers
            .iter()
            .find(|tier| tier.to_km.is_none_or(|to| distance_km <= to))
            .or_else(|| self.config.distance_tiers.last());

        match tier {
            Some(tier) => tier.base + (distance_km - tier.from_km).max(0.0) * tier.per_km,
            None => self.config.zero_distance_price,
        }
    }

    pub fn detect_category(&self, weight_kg: f64, volume_liters: f64) -> CargoCategory {
        self.config.categories.detect(weight_kg, volume_liters)
    }

    pub fn category_multiplier(&self, category: CargoCategory) -> f64 {
        self.config.categories.rule(category).price_multiplier
    }

    /// `1 + min(deviation / max(radius, 1), 1) * surcharge`
    pub fn deviation_multiplier(&self, deviation_km: f64, corridor_radius_km: f64) -> f64 {
        let ratio = (deviation_km.max(0.0) / corridor_radius_km.max(1.0)).min(1.0);
        1.0 + ratio * self.config.max_deviation_surcharge
    }

    pub fn capacity_multiplier(&self, usage_percent: f64, last_slot: bool) -> f64 {
        if last_slot {
            return self.config.last_slot_multiplier;
        }
        self.config
            .capacity_bands
            .iter()
            .find(|band| usage_percent < band.below_percent)
            .map(|band| band.multiplier)
            .unwrap_or(self.config.capacity_full_multiplier)
    }

    pub fn demand_multiplier(&self, demand: DemandSnapshot) -> f64 {
        let bands = &self.config.demand;
        if demand.trips == 0 {
            return if demand.shipments > 0 { bands.no_supply } else { 1.0 };
        }

        let ratio = demand.shipments as f64 / demand.trips as f64;
        if ratio > bands.surge_above {
            bands.surge
        } else if ratio > bands.high_above {
            bands.high
        } else if ratio < bands.glut_below {
            bands.glut
        } else if ratio < bands.low_below {
            bands.low
        } else {
            1.0
        }
    }

    pub fn chargeable_weight(&self, weight_kg: f64, volume_liters: f64) -> f64 {
        chargeable_weight_kg(weight_kg, volume_liters, self.config.dimensional_liters_per_kg)
    }

    pub fn weight_multiplier(&self, chargeable_weight_kg: f64) -> f64 {
        1.0 + chargeable_weight_kg * self.config.weight_factor_per_kg
    }

    pub fn commission_rate(&self, total_price: f64) -> f64 {
        self.config.commission.rate_for(total_price)
    }

    /// Prices cargo over a distance. Total for any finite input.
    pub fn quote(&self, distance_km: f64, cargo: &CargoSpec, context: &PricingContext) -> PriceBreakdown {
        let base_price = self.distance_tier_price(distance_km);
        let chargeable = self.chargeable_weight(cargo.weight_kg, cargo.volume_liters);

        let multipliers = Multipliers {
            category: self.category_multiplier(cargo.category),
            deviation: self.deviation_multiplier(context.deviation_km, context.corridor_radius_km),
            capacity: self.capacity_multiplier(context.trip_usage_percent, context.last_slot),
            demand: self.demand_multiplier(context.demand),
            weight: self.weight_multiplier(chargeable),
        };

        let total_price = round2(base_price * multipliers.product()).max(self.config.floor_price);
        let commission_rate = self.commission_rate(total_price);
        let platform_commission = round2(total_price * commission_rate);
        let carrier_earnings = round2(total_price - platform_commission);

        debug!(
            distance_km,
            category = %cargo.category,
            total_price,
            platform_commission,
            "priced cargo"
        );

        PriceBreakdown {
            total_price,
            carrier_earnings,
            platform_commission,
            commission_rate,
            distance_km,
            base_price,
            chargeable_weight_kg: chargeable,
            category: cargo.category,
            multipliers,
            source: PriceSource::Quote,
        }
    }

    /// Binding price for a shipment being published. Called exactly once
    /// per shipment; the result is stored on it.
    pub fn price_for_shipment(&self, distance_km: f64, dims: &CargoDimensions, category: CargoCategory, context: &PricingContext) -> Result<PriceBreakdown> {
        dims.validate()?;
        let cargo = CargoSpec::from_dimensions(dims, category);
        Ok(self.quote(distance_km, &cargo, context).with_source(PriceSource::Persisted))
    }
}
