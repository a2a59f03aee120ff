//! Decay-weighted sustainability scoring
//!
//! Turns time-stamped CO2 samples plus aggregate totals into one comparable
//! number. Recent emissions dominate through a logistic decay over elapsed
//! hours; total CO2 adds linearly; cost enters inversely as a tie-breaker.

mod profile;
mod weights;

pub use profile::{DecayParameters, EmissionDataPoint, SustainabilityProfile};
pub use weights::SustainabilityWeights;

/// Multiplier applied before truncating a score to an integer
pub const SCORE_SCALING_FACTOR: f64 = 1000.0;

/// Scale a raw score and truncate it toward zero
pub fn scale_score(score: f64) -> i64 {
    (score * SCORE_SCALING_FACTOR) as i64
}
