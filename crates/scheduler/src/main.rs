//! Green Scheduler - sustainability-aware scheduler extender
//!
//! Runs next to kube-scheduler and ranks candidate nodes by the CO2 and
//! cost telemetry of their hardware.

use anyhow::{Context, Result};
use green_scheduler::{api, config::ServiceConfig};
use scheduler_lib::{
    health::{components, HealthRegistry},
    KubeNodeLabels, StructuredLogger, SustainabilityScorer,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SCHEDULER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting green-scheduler");

    let config = ServiceConfig::load()?;
    info!(
        instance = %config.instance_name,
        scheduler_args = ?config.scheduler,
        "Scheduler configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TELEMETRY_API).await;
    health_registry.register(components::KUBE_API).await;

    let labels = KubeNodeLabels::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let logger = StructuredLogger::new(&config.instance_name);
    let scorer = SustainabilityScorer::new(&config.scheduler, Arc::new(labels))
        .context("failed to create sustainability scorer")?
        .with_logger(logger.clone());

    let app_state = Arc::new(api::AppState::new(
        Arc::new(scorer),
        health_registry.clone(),
        config.cycle_timeout(),
    ));

    logger.log_startup(
        SCHEDULER_VERSION,
        config.listen_port,
        &config.scheduler.telemetry_hostname,
    );
    health_registry.set_ready(true).await;

    tokio::select! {
        result = api::serve(config.listen_port, app_state) => {
            if let Err(e) = &result {
                error!(error = %e, "API server stopped");
            }
            logger.log_shutdown("API server stopped");
            result
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
            Ok(())
        }
    }
}
