//! Observability infrastructure for the green scheduler
//!
//! Provides:
//! - Prometheus metrics (scoring latency, telemetry calls, token refreshes, node outcomes)
//! - Structured JSON logging with tracing

use crate::telemetry::Endpoint;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for the per-node pipeline (two API round trips)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<SchedulerMetricsInner> = OnceLock::new();

struct SchedulerMetricsInner {
    score_latency_seconds: Histogram,
    telemetry_requests: IntCounterVec,
    token_refreshes: IntCounter,
    nodes_scored: IntCounterVec,
}

impl SchedulerMetricsInner {
    fn new() -> Self {
        Self {
            score_latency_seconds: register_histogram!(
                "green_scheduler_score_latency_seconds",
                "Time spent scoring a single node, including telemetry calls",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register score_latency_seconds"),

            telemetry_requests: register_int_counter_vec!(
                "green_scheduler_telemetry_requests_total",
                "Requests made to the telemetry and token endpoints",
                &["endpoint", "outcome"]
            )
            .expect("Failed to register telemetry_requests_total"),

            token_refreshes: register_int_counter!(
                "green_scheduler_token_refreshes_total",
                "Number of successful OAuth2 token exchanges"
            )
            .expect("Failed to register token_refreshes_total"),

            nodes_scored: register_int_counter_vec!(
                "green_scheduler_nodes_scored_total",
                "Per-node scoring attempts by outcome",
                &["outcome"]
            )
            .expect("Failed to register nodes_scored_total"),
        }
    }
}

/// How a single node's scoring attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Score computed from telemetry
    Scored,
    /// Node or identifier label missing, neutral score
    NoLabel,
    /// No matching telemetry entity, neutral score
    NoTelemetry,
    Error,
}

impl NodeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeOutcome::Scored => "scored",
            NodeOutcome::NoLabel => "no_label",
            NodeOutcome::NoTelemetry => "no_telemetry",
            NodeOutcome::Error => "error",
        }
    }
}

/// Scheduler metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct SchedulerMetrics {
    _private: (),
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerMetrics {
    /// Create a new metrics handle (registers the global metrics on first use)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SchedulerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SchedulerMetricsInner {
        GLOBAL_METRICS.get_or_init(SchedulerMetricsInner::new)
    }

    pub fn observe_score_latency(&self, duration_secs: f64) {
        self.inner().score_latency_seconds.observe(duration_secs);
    }

    /// Count one call to the token or a telemetry endpoint
    pub fn record_telemetry_request(&self, endpoint: Endpoint, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .telemetry_requests
            .with_label_values(&[endpoint.as_str(), outcome])
            .inc();
    }

    pub fn inc_token_refreshes(&self) {
        self.inner().token_refreshes.inc();
    }

    pub fn record_node_outcome(&self, outcome: NodeOutcome) {
        self.inner()
            .nodes_scored
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn token_refreshes(&self) -> u64 {
        self.inner().token_refreshes.get()
    }

    pub fn nodes_scored(&self, outcome: NodeOutcome) -> u64 {
        self.inner()
            .nodes_scored
            .with_label_values(&[outcome.as_str()])
            .get()
    }
}

/// Structured logger for scheduler events
///
/// Emits event-tagged lines for node outcomes and lifecycle changes. Never
/// given credentials or tokens.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a node scored from telemetry
    pub fn log_node_scored(&self, node: &str, serial: &str, raw_score: f64, scaled_score: i64) {
        info!(
            event = "node_scored",
            instance = %self.instance,
            node = %node,
            serial = %serial,
            raw_score = raw_score,
            score = scaled_score,
            "Computed sustainability score"
        );
    }

    /// Log a node given the neutral score
    pub fn log_node_skipped(&self, node: &str, reason: &str) {
        warn!(
            event = "node_skipped",
            instance = %self.instance,
            node = %node,
            reason = %reason,
            "No telemetry for node, using neutral score"
        );
    }

    /// Log a failed scoring attempt
    pub fn log_node_failed(&self, node: &str, error: &dyn std::error::Error) {
        warn!(
            event = "node_score_failed",
            instance = %self.instance,
            node = %node,
            error = %error,
            "Failed to score node"
        );
    }

    pub fn log_startup(&self, version: &str, listen_port: u16, telemetry_host: &str) {
        info!(
            event = "scheduler_started",
            instance = %self.instance,
            version = %version,
            listen_port = listen_port,
            telemetry_host = %telemetry_host,
            "Green scheduler extender started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scheduler_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Green scheduler extender shutting down"
        );
    }
}
