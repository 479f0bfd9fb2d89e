//! Cargo dimensions and size categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Physical size and weight of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CargoDimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
}

impl CargoDimensions {
    pub fn new(length_cm: f64, width_cm: f64, height_cm: f64, weight_kg: f64) -> Result<Self> {
        let dims = Self {
            length_cm,
            width_cm,
            height_cm,
            weight_kg,
        };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("length_cm", self.length_cm),
            ("width_cm", self.width_cm),
            ("height_cm", self.height_cm),
            ("weight_kg", self.weight_kg),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(MarketError::Validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn volume_liters(&self) -> f64 {
        self.length_cm * self.width_cm * self.height_cm / 1000.0
    }
}

/// Size class of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoCategory {
    Document,
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl CargoCategory {
    /// Ascending ceiling order.
    pub const ALL: [CargoCategory; 5] = [
        CargoCategory::Document,
        CargoCategory::Small,
        CargoCategory::Medium,
        CargoCategory::Large,
        CargoCategory::ExtraLarge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CargoCategory::Document => "document",
            CargoCategory::Small => "small",
            CargoCategory::Medium => "medium",
            CargoCategory::Large => "large",
            CargoCategory::ExtraLarge => "extra_large",
        }
    }
}

impl fmt::Display for CargoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CargoCategory {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        CargoCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| MarketError::Validation(format!("unknown cargo category {:?}", s)))
    }
}

/// Ceilings and price multiplier for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub max_weight_kg: f64,
    pub max_volume_liters: f64,
    pub price_multiplier: f64,
}

impl CategoryRule {
    pub fn accommodates(&self, weight_kg: f64, volume_liters: f64) -> bool {
        weight_kg <= self.max_weight_kg && volume_liters <= self.max_volume_liters
    }
}

/// One rule per category, looked up exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
    pub document: CategoryRule,
    pub small: CategoryRule,
    pub medium: CategoryRule,
    pub large: CategoryRule,
    pub extra_large: CategoryRule,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            document: CategoryRule {
                max_weight_kg: 0.5,
                max_volume_liters: 2.0,
                price_multiplier: 0.5,
            },
            small: CategoryRule {
                max_weight_kg: 5.0,
                max_volume_liters: 20.0,
                price_multiplier: 0.8,
            },
            medium: CategoryRule {
                max_weight_kg: 20.0,
                max_volume_liters: 80.0,
                price_multiplier: 1.0,
            },
            large: CategoryRule {
                max_weight_kg: 50.0,
                max_volume_liters: 250.0,
                price_multiplier: 1.3,
            },
            extra_large: CategoryRule {
                max_weight_kg: f64::MAX,
                max_volume_liters: f64::MAX,
                price_multiplier: 1.6,
            },
        }
    }
}

impl CategoryTable {
    pub fn rule(&self, category: CargoCategory) -> &CategoryRule {
        match category {
            CargoCategory::Document => &self.document,
            CargoCategory::Small => &self.small,
            CargoCategory::Medium => &self.medium,
            CargoCategory::Large => &self.large,
            CargoCategory::ExtraLarge => &self.extra_large,
        }
    }

    /// First category, smallest first, whose ceilings hold both the weight
    /// and the volume. Extra large catches everything else.
    pub fn detect(&self, weight_kg: f64, volume_liters: f64) -> CargoCategory {
        CargoCategory::ALL
            .into_iter()
            .find(|category| self.rule(*category).accommodates(weight_kg, volume_liters))
            .unwrap_or(CargoCategory::ExtraLarge)
    }

    /// Resolves the category for a shipment: an explicit choice must hold
    /// the cargo, otherwise it is detected from the dimensions.
    pub fn resolve(&self, explicit: Option<CargoCategory>, dims: &CargoDimensions) -> Result<CargoCategory> {
        let volume = dims.volume_liters();
        match explicit {
            None => Ok(self.detect(dims.weight_kg, volume)),
            Some(category) => {
                let rule = self.rule(category);
                if dims.weight_kg > rule.max_weight_kg {
                    return Err(MarketError::BusinessRule(format!(
                        "weight {:.2} kg exceeds the {} limit of {} kg",
                        dims.weight_kg, category, rule.max_weight_kg
                    )));
                }
                if volume > rule.max_volume_liters {
                    return Err(MarketError::BusinessRule(format!(
                        "volume {:.2} L exceeds the {} limit of {} L",
                        volume, category, rule.max_volume_liters
                    )));
                }
                Ok(category)
            }
        }
    }
}

/// Greater of actual weight and dimensional weight.
pub fn chargeable_weight_kg(weight_kg: f64, volume_liters: f64, liters_per_kg: f64) -> f64 {
    weight_kg.max(volume_liters / liters_per_kg)
}
