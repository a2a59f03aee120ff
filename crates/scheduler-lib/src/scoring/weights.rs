//! Scoring weights

use serde::{Deserialize, Serialize};

/// Weights for each component of the sustainability score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SustainabilityWeights {
    /// Weight of the decay-weighted CO2 sum
    pub co2_decay_weight: f64,
    /// Weight of total CO2 over the window
    pub total_co2_weight: f64,
    /// Numerator of the inverse-cost term
    pub cost_weight: f64,
    /// Logistic decay rate per elapsed hour, in `[0, 1]`
    pub decay_rate: f64,
}

impl SustainabilityWeights {
    pub fn new(co2_decay_weight: f64, total_co2_weight: f64, cost_weight: f64, decay_rate: f64) -> Self {
        Self {
            co2_decay_weight,
            total_co2_weight,
            cost_weight,
            decay_rate,
        }
    }

    /// Names of the fields violating the configuration rules: every weight
    /// must be non-negative and the decay rate must lie in `[0, 1]`
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut invalid = Vec::new();
        if !(self.co2_decay_weight >= 0.0) {
            invalid.push("co2_decay_weight");
        }
        if !(self.total_co2_weight >= 0.0) {
            invalid.push("total_co2_weight");
        }
        if !(self.cost_weight >= 0.0) {
            invalid.push("cost_weight");
        }
        if !(0.0..=1.0).contains(&self.decay_rate) {
            invalid.push("decay_rate");
        }
        invalid
    }
}
