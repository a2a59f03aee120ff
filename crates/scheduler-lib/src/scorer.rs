//! Per-node sustainability scoring
//!
//! For every candidate node the scorer resolves the node's serial number
//! label, fetches aggregate usage and the usage series for the lookback
//! window, and runs the decay-weighted model. Nodes without a serial label
//! or without matching telemetry get the neutral score 0; every other
//! failure is returned to the caller.

use crate::config::{ConfigError, SchedulerArgs};
use crate::nodes::{LabelLookupError, NodeLabelSource};
use crate::normalize::{normalize_scores, NodeScore};
use crate::observability::{NodeOutcome, SchedulerMetrics, StructuredLogger};
use crate::params::{Field, Filter, FilterOperator, Params, ParamsError};
use crate::scoring::{scale_score, EmissionDataPoint, SustainabilityProfile, SustainabilityWeights};
use crate::telemetry::{TelemetryClient, TelemetryError, TimeWindow};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::debug;

/// Fatal failure of one node's scoring attempt
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("failed to look up labels of node {node}: {source}")]
    LabelLookup {
        node: String,
        #[source]
        source: LabelLookupError,
    },

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("invalid time bucket '{bucket}' in usage series: {source}")]
    TimestampParse {
        bucket: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("scoring deadline exceeded during {stage}")]
    DeadlineExceeded { stage: &'static str },

    #[error("scoring task for node {node} did not complete: {source}")]
    TaskFailed {
        node: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ScoreError {
    /// Whether the failure came from the telemetry API or its token endpoint
    pub fn is_telemetry(&self) -> bool {
        matches!(self, ScoreError::Telemetry(_))
    }
}

/// Failure to construct a scorer
#[derive(Debug, Error)]
pub enum ScorerInitError {
    #[error("invalid scheduler arguments: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create telemetry client: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Time budget of one scheduling cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleContext {
    deadline: tokio::time::Instant,
}

impl CycleContext {
    pub fn new(deadline: tokio::time::Instant) -> Self {
        Self { deadline }
    }

    /// Cycle ending `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(tokio::time::Instant::now() + timeout)
    }

    pub fn deadline(&self) -> tokio::time::Instant {
        self.deadline
    }

    async fn run<F, T>(&self, stage: &'static str, fut: F) -> Result<T, ScoreError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| ScoreError::DeadlineExceeded { stage })
    }
}

/// How a node's score was arrived at
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvaluation {
    Scored {
        serial: String,
        raw_score: f64,
        score: i64,
    },
    /// Node or serial label missing
    NoLabel { reason: String },
    /// No telemetry entity matched the serial number
    NoTelemetry { serial: String },
}

impl NodeEvaluation {
    /// Scaled integer score; 0 for the neutral cases
    pub fn score(&self) -> i64 {
        match self {
            NodeEvaluation::Scored { score, .. } => *score,
            NodeEvaluation::NoLabel { .. } | NodeEvaluation::NoTelemetry { .. } => 0,
        }
    }

    pub fn outcome(&self) -> NodeOutcome {
        match self {
            NodeEvaluation::Scored { .. } => NodeOutcome::Scored,
            NodeEvaluation::NoLabel { .. } => NodeOutcome::NoLabel,
            NodeEvaluation::NoTelemetry { .. } => NodeOutcome::NoTelemetry,
        }
    }
}

/// Normalized scores of one cycle plus the nodes that failed
#[derive(Debug)]
pub struct CycleScores {
    /// One entry per requested node, in request order
    pub scores: Vec<NodeScore>,
    pub failures: Vec<(String, ScoreError)>,
}

/// Scores nodes by the sustainability of their hardware
pub struct SustainabilityScorer {
    labels: Arc<dyn NodeLabelSource>,
    telemetry: TelemetryClient,
    serial_num_label: String,
    consideration_days: f64,
    time_series_interval: String,
    weights: SustainabilityWeights,
    metrics: SchedulerMetrics,
    logger: StructuredLogger,
}

impl SustainabilityScorer {
    /// Validate the arguments and build the telemetry client
    pub fn new(
        args: &SchedulerArgs,
        labels: Arc<dyn NodeLabelSource>,
    ) -> Result<Self, ScorerInitError> {
        args.validate()?;
        let telemetry = TelemetryClient::new(args.client_config())?;

        Ok(Self {
            labels,
            telemetry,
            serial_num_label: args.serial_num_label.clone(),
            consideration_days: args.consideration_days,
            time_series_interval: args.time_series_interval.clone(),
            weights: args.weights(),
            metrics: SchedulerMetrics::new(),
            logger: StructuredLogger::new(env!("CARGO_PKG_NAME")),
        })
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn telemetry(&self) -> &TelemetryClient {
        &self.telemetry
    }

    pub fn weights(&self) -> &SustainabilityWeights {
        &self.weights
    }

    /// Scaled integer score of one node
    pub async fn score_node(&self, node: &str, ctx: &CycleContext) -> Result<i64, ScoreError> {
        self.evaluate_node(node, ctx).await.map(|eval| eval.score())
    }

    /// Score one node and report how the score came about
    pub async fn evaluate_node(
        &self,
        node: &str,
        ctx: &CycleContext,
    ) -> Result<NodeEvaluation, ScoreError> {
        let started = Instant::now();
        let result = self.evaluate_node_inner(node, ctx).await;
        self.metrics
            .observe_score_latency(started.elapsed().as_secs_f64());

        match &result {
            Ok(eval) => {
                self.metrics.record_node_outcome(eval.outcome());
                match eval {
                    NodeEvaluation::Scored {
                        serial,
                        raw_score,
                        score,
                    } => self.logger.log_node_scored(node, serial, *raw_score, *score),
                    NodeEvaluation::NoLabel { reason } => self.logger.log_node_skipped(node, reason),
                    NodeEvaluation::NoTelemetry { serial } => self
                        .logger
                        .log_node_skipped(node, &format!("no telemetry entity for serial {}", serial)),
                }
            }
            Err(e) => {
                self.metrics.record_node_outcome(NodeOutcome::Error);
                self.logger.log_node_failed(node, e);
            }
        }

        result
    }

    async fn evaluate_node_inner(
        &self,
        node: &str,
        ctx: &CycleContext,
    ) -> Result<NodeEvaluation, ScoreError> {
        let lookup = ctx
            .run("label lookup", self.labels.node_label(node, &self.serial_num_label))
            .await?;

        let serial = match lookup {
            Ok(serial) => serial,
            Err(e) if e.is_not_found() => {
                return Ok(NodeEvaluation::NoLabel {
                    reason: e.to_string(),
                })
            }
            Err(source) => {
                return Err(ScoreError::LabelLookup {
                    node: node.to_string(),
                    source,
                })
            }
        };

        debug!(node = %node, serial = %serial, "Resolved node serial number");

        Ok(match self.raw_score(&serial, ctx).await? {
            Some(raw_score) => NodeEvaluation::Scored {
                score: scale_score(raw_score),
                raw_score,
                serial,
            },
            None => NodeEvaluation::NoTelemetry { serial },
        })
    }

    /// Unscaled score of the hardware with this serial number
    ///
    /// `None` when the telemetry API has no entity for the serial. A series
    /// sample with an unparseable time bucket fails the whole attempt.
    pub async fn raw_score(
        &self,
        serial: &str,
        ctx: &CycleContext,
    ) -> Result<Option<f64>, ScoreError> {
        let params = Params::new().with_filter(Filter::new(
            Field::EntitySerialNum,
            FilterOperator::Equals,
            vec![serial.to_string()],
        )?);
        let window = TimeWindow::lookback(Utc::now(), self.consideration_days);

        let totals = ctx
            .run("usage-by-entity", self.telemetry.usage_by_entity(&window, &params))
            .await??;
        let series = ctx
            .run(
                "usage-series",
                self.telemetry
                    .usage_series(&window, &self.time_series_interval, &params),
            )
            .await??;

        let emissions = series
            .items
            .iter()
            .map(|item| {
                let timestamp =
                    item.time_bucket()
                        .map_err(|source| ScoreError::TimestampParse {
                            bucket: item.time_bucket.clone(),
                            source,
                        })?;
                Ok(EmissionDataPoint::new(item.usage.co2e_metric_ton(), timestamp))
            })
            .collect::<Result<Vec<_>, ScoreError>>()?;

        let Some(entity) = totals.items.first() else {
            return Ok(None);
        };

        let profile = SustainabilityProfile::new(
            emissions,
            entity.usage.co2e_metric_ton(),
            entity.usage.cost_usd(),
        );
        Ok(Some(profile.calculate_score(&self.weights)))
    }

    /// Score every node concurrently, then normalize the batch onto `[0, max]`
    ///
    /// Nodes whose scoring fails enter normalization with score 0.
    pub async fn score_cycle(
        self: Arc<Self>,
        nodes: Vec<String>,
        ctx: CycleContext,
        max: i64,
    ) -> CycleScores {
        let mut scores: Vec<NodeScore> = nodes
            .iter()
            .map(|node| NodeScore::new(node.clone(), 0))
            .collect();
        let mut failures = Vec::new();

        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.into_iter().enumerate() {
            let scorer = Arc::clone(&self);
            let task_node = node.clone();
            let handle = tasks.spawn(async move { scorer.score_node(&task_node, &ctx).await });
            pending.insert(handle.id(), (index, node));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let id = match &joined {
                Ok((id, _)) => *id,
                Err(e) => e.id(),
            };
            let Some((index, node)) = pending.remove(&id) else {
                continue;
            };
            match joined {
                Ok((_, Ok(score))) => scores[index].score = score,
                Ok((_, Err(e))) => failures.push((node, e)),
                Err(source) => {
                    let e = ScoreError::TaskFailed {
                        node: node.clone(),
                        source,
                    };
                    self.metrics.record_node_outcome(NodeOutcome::Error);
                    self.logger.log_node_failed(&node, &e);
                    failures.push((node, e));
                }
            }
        }

        normalize_scores(&mut scores, max);
        CycleScores { scores, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_args;
    use crate::nodes::StaticNodeLabels;
    use crate::normalize::MAX_NODE_SCORE;
    use crate::telemetry::{USAGE_BY_ENTITY_PATH, USAGE_SERIES_PATH};
    use async_trait::async_trait;
    use mockito::{Matcher, Mock, ServerGuard};
    use std::collections::BTreeMap;

    const SERIAL_LABEL: &str = "hardware.example.com/serial-number";

    fn args(server: &ServerGuard) -> SchedulerArgs {
        SchedulerArgs {
            telemetry_hostname: server.url(),
            token_url: format!("{}/token", server.url()),
            serial_num_label: SERIAL_LABEL.to_string(),
            co2_decay_weight: 2.0,
            total_co2_weight: 1.0,
            cost_weight: 1.0,
            decay_rate: 0.1,
            ..valid_args()
        }
    }

    async fn scorer(server: &ServerGuard, labels: StaticNodeLabels) -> SustainabilityScorer {
        SustainabilityScorer::new(&args(server), Arc::new(labels)).unwrap()
    }

    async fn labelled(nodes: &[(&str, &str)]) -> StaticNodeLabels {
        let labels = StaticNodeLabels::new();
        for (node, serial) in nodes {
            labels.insert_label(*node, SERIAL_LABEL, *serial).await;
        }
        labels
    }

    fn ctx() -> CycleContext {
        CycleContext::with_timeout(Duration::from_secs(10))
    }

    async fn mock_token(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 3600}"#)
            .create_async()
            .await
    }

    async fn mock_usage(server: &mut ServerGuard, path: &str, serial: &str, body: &str) -> Mock {
        server
            .mock("GET", path)
            .match_query(Matcher::UrlEncoded(
                "filter".into(),
                format!("entitySerialNum eq '{}'", serial),
            ))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await
    }

    const REFERENCE_TOTALS: &str = r#"{"items": [{"entitySerialNum": "ABC123", "co2eMetricTon": 10.0, "costUsd": 5.0, "kwh": 42.0}], "count": 1, "total": 1, "offset": 0}"#;
    const REFERENCE_SERIES: &str = r#"{"items": [
        {"timeBucket": "2024-03-01T06:00:00Z", "co2eMetricTon": 1.0},
        {"timeBucket": "2024-03-01T06:00:00Z", "co2eMetricTon": 2.0},
        {"timeBucket": "2024-03-01T06:00:00Z", "co2eMetricTon": 3.0}
    ], "count": 3}"#;

    #[tokio::test]
    async fn test_node_without_label_scores_zero_without_http() {
        let mut server = mockito::Server::new_async().await;
        let token = server.mock("POST", "/token").expect(0).create_async().await;
        let usage = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let labels = StaticNodeLabels::new();
        labels
            .insert_label("worker-1", "kubernetes.io/hostname", "worker-1")
            .await;
        let scorer = scorer(&server, labels).await;

        assert_eq!(scorer.score_node("worker-1", &ctx()).await.unwrap(), 0);
        assert!(matches!(
            scorer.evaluate_node("missing-node", &ctx()).await.unwrap(),
            NodeEvaluation::NoLabel { .. }
        ));

        token.assert_async().await;
        usage.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_aggregate_scores_zero() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = mock_usage(
            &mut server,
            USAGE_BY_ENTITY_PATH,
            "XYZ",
            r#"{"items": [], "count": 0, "total": 0, "offset": 0}"#,
        )
        .await;
        let _series = mock_usage(&mut server, USAGE_SERIES_PATH, "XYZ", r#"{"items": [], "count": 0}"#).await;

        let scorer = scorer(&server, labelled(&[("worker-1", "XYZ")]).await).await;
        let eval = scorer.evaluate_node("worker-1", &ctx()).await.unwrap();
        assert_eq!(
            eval,
            NodeEvaluation::NoTelemetry {
                serial: "XYZ".to_string()
            }
        );
        assert_eq!(eval.score(), 0);
    }

    #[tokio::test]
    async fn test_reference_scenario_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = mock_usage(&mut server, USAGE_BY_ENTITY_PATH, "ABC123", REFERENCE_TOTALS).await;
        let _series = mock_usage(&mut server, USAGE_SERIES_PATH, "ABC123", REFERENCE_SERIES).await;

        let scorer = scorer(&server, labelled(&[("worker-1", "ABC123")]).await).await;

        match scorer.evaluate_node("worker-1", &ctx()).await.unwrap() {
            NodeEvaluation::Scored {
                serial,
                raw_score,
                score,
            } => {
                assert_eq!(serial, "ABC123");
                assert!((raw_score - (16.0 + 1.0 / 6.0)).abs() < 1e-9, "{raw_score}");
                assert_eq!(score, 16166);
            }
            other => panic!("unexpected evaluation: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_series_request_carries_interval_and_window() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = mock_usage(&mut server, USAGE_BY_ENTITY_PATH, "ABC123", REFERENCE_TOTALS).await;
        let series = server
            .mock("GET", USAGE_SERIES_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("interval".into(), "1h".into()),
                Matcher::Regex("start-time=".into()),
                Matcher::Regex("end-time=".into()),
            ]))
            .with_status(200)
            .with_body(REFERENCE_SERIES)
            .expect(1)
            .create_async()
            .await;

        let scorer = scorer(&server, labelled(&[("worker-1", "ABC123")]).await).await;
        scorer.score_node("worker-1", &ctx()).await.unwrap();
        series.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_time_bucket_fails_node() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = mock_usage(&mut server, USAGE_BY_ENTITY_PATH, "ABC123", REFERENCE_TOTALS).await;
        let _series = mock_usage(
            &mut server,
            USAGE_SERIES_PATH,
            "ABC123",
            r#"{"items": [
                {"timeBucket": "2024-03-01T06:00:00Z", "co2eMetricTon": 1.0},
                {"timeBucket": "yesterday", "co2eMetricTon": 2.0}
            ], "count": 2}"#,
        )
        .await;

        let scorer = scorer(&server, labelled(&[("worker-1", "ABC123")]).await).await;
        match scorer.score_node("worker-1", &ctx()).await {
            Err(ScoreError::TimestampParse { bucket, .. }) => assert_eq!(bucket, "yesterday"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_failure_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = server
            .mock("GET", USAGE_BY_ENTITY_PATH)
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend unavailable")
            .create_async()
            .await;

        let scorer = scorer(&server, labelled(&[("worker-1", "ABC123")]).await).await;
        let err = scorer.score_node("worker-1", &ctx()).await.unwrap_err();
        assert!(err.is_telemetry());
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_expired_deadline() {
        let server = mockito::Server::new_async().await;
        let scorer = scorer(&server, labelled(&[("worker-1", "ABC123")]).await).await;

        let expired = CycleContext::new(tokio::time::Instant::now());
        let err = scorer.score_node("worker-1", &expired).await.unwrap_err();
        assert!(matches!(err, ScoreError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_invalid_args_are_rejected() {
        let invalid = SchedulerArgs {
            decay_rate: 2.0,
            ..valid_args()
        };
        let result = SustainabilityScorer::new(&invalid, Arc::new(StaticNodeLabels::new()));
        assert!(matches!(result, Err(ScorerInitError::Config(_))));
    }

    #[tokio::test]
    async fn test_score_cycle_normalizes_and_isolates_failures() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = mock_usage(&mut server, USAGE_BY_ENTITY_PATH, "ABC123", REFERENCE_TOTALS).await;
        let _series = mock_usage(&mut server, USAGE_SERIES_PATH, "ABC123", REFERENCE_SERIES).await;
        let _broken = server
            .mock("GET", USAGE_BY_ENTITY_PATH)
            .match_query(Matcher::UrlEncoded(
                "filter".into(),
                "entitySerialNum eq 'BROKEN'".into(),
            ))
            .with_status(503)
            .create_async()
            .await;

        let labels = labelled(&[("green", "ABC123"), ("broken", "BROKEN")]).await;
        let scorer = Arc::new(scorer(&server, labels).await);

        let nodes = vec![
            "green".to_string(),
            "unlabelled".to_string(),
            "broken".to_string(),
        ];
        let cycle = scorer.score_cycle(nodes, ctx(), MAX_NODE_SCORE).await;

        assert_eq!(
            cycle.scores,
            vec![
                NodeScore::new("green", 100),
                NodeScore::new("unlabelled", 0),
                NodeScore::new("broken", 0),
            ]
        );
        assert_eq!(cycle.failures.len(), 1);
        assert_eq!(cycle.failures[0].0, "broken");
        assert!(cycle.failures[0].1.is_telemetry());
    }

    #[tokio::test]
    async fn test_serial_with_quote_fails_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let usage = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let scorer = scorer(&server, labelled(&[("worker-1", "AB'C")]).await).await;
        let err = scorer.score_node("worker-1", &ctx()).await.unwrap_err();
        assert!(matches!(err, ScoreError::Params(ParamsError::QuotedValue(_))));

        usage.assert_async().await;
    }

    /// Label source that panics for one node and delegates the rest
    struct PanicsOn {
        node: &'static str,
        inner: StaticNodeLabels,
    }

    #[async_trait]
    impl NodeLabelSource for PanicsOn {
        async fn node_labels(
            &self,
            node: &str,
        ) -> Result<BTreeMap<String, String>, LabelLookupError> {
            if node == self.node {
                panic!("label source crashed on {}", node);
            }
            self.inner.node_labels(node).await
        }
    }

    #[tokio::test]
    async fn test_score_cycle_reports_panicked_task() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _totals = mock_usage(&mut server, USAGE_BY_ENTITY_PATH, "ABC123", REFERENCE_TOTALS).await;
        let _series = mock_usage(&mut server, USAGE_SERIES_PATH, "ABC123", REFERENCE_SERIES).await;

        let labels = PanicsOn {
            node: "crashing",
            inner: labelled(&[("green", "ABC123")]).await,
        };
        let scorer = Arc::new(SustainabilityScorer::new(&args(&server), Arc::new(labels)).unwrap());

        let cycle = scorer
            .score_cycle(
                vec!["crashing".to_string(), "green".to_string()],
                ctx(),
                MAX_NODE_SCORE,
            )
            .await;

        assert_eq!(
            cycle.scores,
            vec![NodeScore::new("crashing", 0), NodeScore::new("green", 100)]
        );
        assert_eq!(cycle.failures.len(), 1);
        let (node, e) = &cycle.failures[0];
        assert_eq!(node, "crashing");
        assert!(matches!(
            e,
            ScoreError::TaskFailed { node, source } if node == "crashing" && source.is_panic()
        ));
    }
}
