//! HTTP API: extender prioritize verb, health checks and Prometheus metrics

use crate::extender::{ExtenderArgs, HostPriority, HostPriorityList};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use scheduler_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    CycleContext, ScoreError, SustainabilityScorer, MAX_EXTENDER_PRIORITY,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<SustainabilityScorer>,
    pub health_registry: HealthRegistry,
    pub cycle_timeout: Duration,
}

impl AppState {
    pub fn new(
        scorer: Arc<SustainabilityScorer>,
        health_registry: HealthRegistry,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            scorer,
            health_registry,
            cycle_timeout,
        }
    }

    /// Reflect one cycle's failures in component health
    async fn record_failures(&self, failures: &[(String, ScoreError)]) {
        let telemetry_failure = failures.iter().find(|(_, e)| e.is_telemetry());
        match telemetry_failure {
            Some((node, e)) => {
                self.health_registry
                    .set_degraded(components::TELEMETRY_API, format!("{}: {}", node, e))
                    .await
            }
            None => self.health_registry.set_healthy(components::TELEMETRY_API).await,
        }

        let label_failure = failures
            .iter()
            .find(|(_, e)| matches!(e, ScoreError::LabelLookup { .. }));
        match label_failure {
            Some((_, e)) => {
                self.health_registry
                    .set_degraded(components::KUBE_API, e.to_string())
                    .await
            }
            None => self.health_registry.set_healthy(components::KUBE_API).await,
        }
    }
}

/// Score every candidate node and return priorities on the extender scale
async fn prioritize(
    State(state): State<Arc<AppState>>,
    Json(args): Json<ExtenderArgs>,
) -> Json<HostPriorityList> {
    let nodes = args.candidate_nodes();
    info!(pod = %args.pod_key(), candidates = nodes.len(), "Prioritizing nodes");

    let ctx = CycleContext::with_timeout(state.cycle_timeout);
    let cycle = Arc::clone(&state.scorer)
        .score_cycle(nodes, ctx, MAX_EXTENDER_PRIORITY)
        .await;

    for (node, e) in &cycle.failures {
        error!(node = %node, error = %e, "Node scored 0 after scoring failure");
    }
    state.record_failures(&cycle.failures).await;

    let priorities: HostPriorityList = cycle.scores.into_iter().map(HostPriority::from).collect();
    debug!(priorities = ?priorities, "Prioritize result");

    Json(priorities)
}

/// 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prioritize", post(prioritize))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting extender API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
