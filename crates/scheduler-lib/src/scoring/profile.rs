//! Emission samples and the per-node sustainability profile

use super::SustainabilityWeights;
use chrono::{DateTime, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Reference point for decay calculations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayParameters {
    /// Latest sample time in the profile, not wall-clock now
    pub reference_time: DateTime<Utc>,
    pub decay_rate: f64,
}

impl DecayParameters {
    pub fn new(reference_time: DateTime<Utc>, decay_rate: f64) -> Self {
        Self {
            reference_time,
            decay_rate,
        }
    }
}

/// CO2 emitted during one time bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionDataPoint {
    /// Metric tons of CO2 equivalent
    pub co2: f64,
    pub timestamp: DateTime<Utc>,
}

impl EmissionDataPoint {
    pub fn new(co2: f64, timestamp: DateTime<Utc>) -> Self {
        Self { co2, timestamp }
    }

    /// Logistic weight `e^(-r·Δh) / (1 + e^(-r·Δh))` for a sample `Δh` hours
    /// before the reference time.
    ///
    /// The result is 0.5 at the reference time and tends to 0 with age. A
    /// sample after the reference time gets full weight (1.0).
    pub fn decay_factor(&self, params: &DecayParameters) -> f64 {
        let elapsed_hours =
            (params.reference_time - self.timestamp).num_milliseconds() as f64 / MILLIS_PER_HOUR;

        if elapsed_hours < 0.0 {
            return 1.0;
        }

        let decay = (-params.decay_rate * elapsed_hours).exp();
        decay / (1.0 + decay)
    }
}

/// Everything needed to score one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SustainabilityProfile {
    /// Samples in any order
    pub emissions: Vec<EmissionDataPoint>,
    pub total_co2: f64,
    pub total_cost: f64,
}

impl SustainabilityProfile {
    pub fn new(emissions: Vec<EmissionDataPoint>, total_co2: f64, total_cost: f64) -> Self {
        Self {
            emissions,
            total_co2,
            total_cost,
        }
    }

    /// Latest sample time, found by a full scan
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.emissions.iter().map(|point| point.timestamp).max()
    }

    /// `Σ decay_i · co2_i` over all samples; 0 when there are none
    pub fn decayed_co2(&self, decay_rate: f64) -> f64 {
        let Some(reference_time) = self.reference_time() else {
            return 0.0;
        };
        let params = DecayParameters::new(reference_time, decay_rate);

        self.emissions
            .iter()
            .map(|point| point.decay_factor(&params) * point.co2)
            .sum()
    }

    /// Weighted sum of the decayed CO2, total CO2 and inverse-cost terms
    pub fn calculate_score(&self, weights: &SustainabilityWeights) -> f64 {
        let decayed = weights.co2_decay_weight * self.decayed_co2(weights.decay_rate);
        let total = weights.total_co2_weight * self.total_co2;
        let cost = weights.cost_weight / (1.0 + self.total_cost);

        decayed + total + cost
    }
}
