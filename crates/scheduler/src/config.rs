//! Extender service configuration

use anyhow::{Context, Result};
use scheduler_lib::SchedulerArgs;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "GREENSCHED_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name used in structured log events (pod name from the downward API)
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for the extender, health and metrics endpoints
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Budget for scoring all candidates of one prioritize request
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,

    #[serde(default)]
    pub scheduler: SchedulerArgs,
}

fn default_instance_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "green-scheduler".to_string())
}

fn default_listen_port() -> u16 {
    8080
}

fn default_cycle_timeout() -> u64 {
    10
}

impl ServiceConfig {
    /// Load from the optional config file, then `GREENSCHED_*` environment
    /// variables (`__` separates nested keys, e.g.
    /// `GREENSCHED_SCHEDULER__CLIENT_SECRET`)
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("GREENSCHED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already assembled configuration
    pub fn from_config(config: config::Config) -> Result<Self> {
        let service: ServiceConfig = config
            .try_deserialize()
            .context("failed to parse configuration")?;

        service
            .scheduler
            .validate()
            .context("invalid scheduler arguments")?;

        Ok(service)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }
}
