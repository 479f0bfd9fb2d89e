//! Immutable configuration for the pricing, matching and capacity engines.
//!
//! Built once by the host process (usually from defaults, optionally
//! deserialized) and handed to the engines by value.

use serde::{Deserialize, Serialize};

use crate::cargo::CategoryTable;

/// One band of the distance schedule: `base + (distance - from_km) * per_km`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceTier {
    pub from_km: f64,
    /// Inclusive upper bound; `None` for the open-ended last band.
    pub to_km: Option<f64>,
    pub base: f64,
    pub per_km: f64,
}

/// Capacity-pressure multiplier applied while trip usage is below a bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityBand {
    pub below_percent: f64,
    pub multiplier: f64,
}

/// Demand/supply ratio thresholds (shipments per trip on the same route
/// and day) and their multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandBands {
    pub surge_above: f64,
    pub surge: f64,
    pub high_above: f64,
    pub high: f64,
    pub glut_below: f64,
    pub glut: f64,
    pub low_below: f64,
    pub low: f64,
    /// Applied when shipments exist but no trip serves the route.
    pub no_supply: f64,
}

impl Default for DemandBands {
    fn default() -> Self {
        Self {
            surge_above: 3.0,
            surge: 1.3,
            high_above: 1.5,
            high: 1.15,
            glut_below: 0.3,
            glut: 0.9,
            low_below: 0.7,
            low: 0.95,
            no_supply: 1.3,
        }
    }
}

/// Platform cut for totals at or above `from_price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionTier {
    pub from_price: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSchedule {
    /// Ascending by `from_price`, first tier starting at zero.
    pub tiers: Vec<CommissionTier>,
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                CommissionTier { from_price: 0.0, rate: 0.25 },
                CommissionTier { from_price: 50.0, rate: 0.20 },
                CommissionTier { from_price: 200.0, rate: 0.18 },
                CommissionTier { from_price: 500.0, rate: 0.15 },
            ],
        }
    }
}

impl CommissionSchedule {
    pub fn rate_for(&self, total_price: f64) -> f64 {
        self.tiers
            .iter()
            .take_while(|tier| total_price >= tier.from_price)
            .last()
            .or_else(|| self.tiers.first())
            .map(|tier| tier.rate)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub distance_tiers: Vec<DistanceTier>,
    /// Tier price for zero or negative distances.
    pub zero_distance_price: f64,
    /// Lowest total ever charged.
    pub floor_price: f64,
    /// Deviation multiplier tops out at `1 + max_deviation_surcharge`.
    pub max_deviation_surcharge: f64,
    pub capacity_bands: Vec<CapacityBand>,
    /// Applied once usage passes every band.
    pub capacity_full_multiplier: f64,
    pub last_slot_multiplier: f64,
    pub demand: DemandBands,
    pub weight_factor_per_kg: f64,
    /// Liters per chargeable kilogram for dimensional weight.
    pub dimensional_liters_per_kg: f64,
    pub categories: CategoryTable,
    pub commission: CommissionSchedule,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            distance_tiers: vec![
                DistanceTier { from_km: 0.0, to_km: Some(50.0), base: 5.0, per_km: 0.30 },
                DistanceTier { from_km: 50.0, to_km: Some(200.0), base: 20.0, per_km: 0.20 },
                DistanceTier { from_km: 200.0, to_km: Some(500.0), base: 50.0, per_km: 0.15 },
                DistanceTier { from_km: 500.0, to_km: None, base: 95.0, per_km: 0.10 },
            ],
            zero_distance_price: 5.0,
            floor_price: 8.0,
            max_deviation_surcharge: 0.5,
            capacity_bands: vec![
                CapacityBand { below_percent: 30.0, multiplier: 0.9 },
                CapacityBand { below_percent: 60.0, multiplier: 1.0 },
                CapacityBand { below_percent: 80.0, multiplier: 1.1 },
            ],
            capacity_full_multiplier: 1.2,
            last_slot_multiplier: 1.3,
            demand: DemandBands::default(),
            weight_factor_per_kg: 0.02,
            dimensional_liters_per_kg: 5.0,
            categories: CategoryTable::default(),
            commission: CommissionSchedule::default(),
        }
    }
}

/// Weights and bands of the 0-100 match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub distance_weight: f64,
    pub rating_weight: f64,
    pub base_score: f64,
    pub fit_optimal_score: f64,
    pub fit_underutilized_score: f64,
    pub fit_near_capacity_score: f64,
    pub optimal_load_min: f64,
    pub optimal_load_max: f64,
    /// Rating assumed for users nobody has rated yet.
    pub default_rating: f64,
    pub suggestion_limit: usize,
    /// Require pickup to come before dropoff along the route.
    pub enforce_direction: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance_weight: 40.0,
            rating_weight: 30.0,
            base_score: 10.0,
            fit_optimal_score: 20.0,
            fit_underutilized_score: 10.0,
            fit_near_capacity_score: 15.0,
            optimal_load_min: 0.3,
            optimal_load_max: 0.8,
            default_rating: 5.0,
            suggestion_limit: 20,
            enforce_direction: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Combined utilization at which a trip counts as full.
    pub full_threshold_percent: f64,
    pub default_corridor_radius_km: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            full_threshold_percent: 95.0,
            default_corridor_radius_km: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub pricing: PricingConfig,
    pub matching: MatchingConfig,
    pub capacity: CapacityConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_tier_boundaries() {
        let schedule = CommissionSchedule::default();
        assert_eq!(schedule.rate_for(8.0), 0.25);
        assert_eq!(schedule.rate_for(49.99), 0.25);
        assert_eq!(schedule.rate_for(50.0), 0.20);
        assert_eq!(schedule.rate_for(199.99), 0.20);
        assert_eq!(schedule.rate_for(200.0), 0.18);
        assert_eq!(schedule.rate_for(500.0), 0.15);
        assert_eq!(schedule.rate_for(10_000.0), 0.15);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: MarketConfig =
            serde_json::from_str(r#"{"matching": {"enforce_direction": true}}"#).unwrap();
        assert!(config.matching.enforce_direction);
        assert_eq!(config.matching.suggestion_limit, 20);
        assert_eq!(config.pricing, PricingConfig::default());
    }
}
