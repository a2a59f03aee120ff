//! Scheduler plugin arguments and their validation

use crate::scoring::SustainabilityWeights;
use crate::telemetry::{ClientConfig, TokenConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest lookback window accepted, in days
pub const MAX_CONSIDERATION_DAYS: f64 = 36_500.0;

/// Rejected plugin configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required arguments: {}", .0.join(", "))]
    MissingArguments(Vec<&'static str>),

    #[error("invalid weight or decay rate: {}", .0.join(", "))]
    InvalidWeights(Vec<&'static str>),

    #[error("consideration_days must be greater than 0 and at most 36500 (got {0})")]
    InvalidConsiderationDays(f64),
}

/// Arguments the sustainability scorer is constructed from
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SchedulerArgs {
    /// Telemetry API host, or a base URL including scheme
    #[serde(default)]
    pub telemetry_hostname: String,
    /// OAuth2 token endpoint
    #[serde(default)]
    pub token_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Node label holding the telemetry serial number
    #[serde(default)]
    pub serial_num_label: String,
    /// Lookback window in days
    #[serde(default)]
    pub consideration_days: f64,
    /// Series bucket size understood by the telemetry API (e.g. `1h`, `1d`)
    #[serde(default)]
    pub time_series_interval: String,
    #[serde(default)]
    pub co2_decay_weight: f64,
    #[serde(default)]
    pub total_co2_weight: f64,
    #[serde(default)]
    pub cost_weight: f64,
    #[serde(default)]
    pub decay_rate: f64,
}

impl fmt::Debug for SchedulerArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerArgs")
            .field("telemetry_hostname", &self.telemetry_hostname)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("serial_num_label", &self.serial_num_label)
            .field("consideration_days", &self.consideration_days)
            .field("time_series_interval", &self.time_series_interval)
            .field("weights", &self.weights())
            .finish()
    }
}

impl SchedulerArgs {
    /// Check every rule before any client is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("telemetry_hostname", &self.telemetry_hostname),
            ("token_url", &self.token_url),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("serial_num_label", &self.serial_num_label),
            ("time_series_interval", &self.time_series_interval),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingArguments(missing));
        }

        let invalid = self.weights().invalid_fields();
        if !invalid.is_empty() {
            return Err(ConfigError::InvalidWeights(invalid));
        }

        if !(self.consideration_days > 0.0 && self.consideration_days <= MAX_CONSIDERATION_DAYS) {
            return Err(ConfigError::InvalidConsiderationDays(self.consideration_days));
        }

        Ok(())
    }

    pub fn weights(&self) -> SustainabilityWeights {
        SustainabilityWeights::new(
            self.co2_decay_weight,
            self.total_co2_weight,
            self.cost_weight,
            self.decay_rate,
        )
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            hostname: self.telemetry_hostname.clone(),
            token: TokenConfig {
                url: self.token_url.clone(),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
            },
        }
    }
}
