//! Sustainability-aware node scoring for Kubernetes scheduling
//!
//! This crate provides the core functionality for:
//! - Querying the sustainability telemetry API (filters, sorts, paging)
//! - OAuth2 client-credentials token management
//! - Decay-weighted scoring of per-node CO2 and cost telemetry
//! - Batch normalization of node scores
//! - Node label lookup, health checks and observability

pub mod config;
pub mod health;
pub mod nodes;
pub mod normalize;
pub mod observability;
pub mod params;
pub mod scorer;
pub mod scoring;
pub mod telemetry;

pub use config::{ConfigError, SchedulerArgs, MAX_CONSIDERATION_DAYS};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use nodes::{KubeNodeLabels, LabelLookupError, NodeLabelSource, StaticNodeLabels};
pub use normalize::{normalize_scores, NodeScore, MAX_EXTENDER_PRIORITY, MAX_NODE_SCORE};
pub use observability::{NodeOutcome, SchedulerMetrics, StructuredLogger};
pub use scorer::{
    CycleContext, CycleScores, NodeEvaluation, ScoreError, ScorerInitError, SustainabilityScorer,
};
pub use telemetry::{TelemetryClient, TelemetryError};
