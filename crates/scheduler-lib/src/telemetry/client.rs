//! HTTP client for the telemetry endpoints
//!
//! Each call is a single authenticated round trip: no retries and no
//! backoff. The full body is buffered before decoding.

use super::{
    read_json, Endpoint, TelemetryError, TokenConfig, TokenManager, UsageByEntityResponse,
    UsageSeriesResponse,
};
use crate::observability::SchedulerMetrics;
use crate::params::Params;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

pub const USAGE_BY_ENTITY_PATH: &str = "/sustainability-insight-ctr/v1beta1/usage-by-entity";
pub const USAGE_SERIES_PATH: &str = "/sustainability-insight-ctr/v1beta1/usage-series";

/// Configuration for the telemetry API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API host (`sic.example.com`, https assumed) or a base URL with scheme
    pub hostname: String,
    pub token: TokenConfig,
}

/// Time range a telemetry query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window ending at `end` and reaching back `days` (fractions allowed)
    ///
    /// Negative or NaN `days` give an empty window; a lookback past the
    /// earliest representable time starts there instead.
    pub fn lookback(end: DateTime<Utc>, days: f64) -> Self {
        let millis = ((days * 86_400_000.0) as i64).clamp(0, i64::MAX);
        let start = end
            .checked_sub_signed(Duration::milliseconds(millis))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Authenticated client for the sustainability telemetry API
pub struct TelemetryClient {
    http: Client,
    base_url: Url,
    tokens: TokenManager,
    metrics: SchedulerMetrics,
}

impl TelemetryClient {
    /// Create a new telemetry client
    pub fn new(config: ClientConfig) -> Result<Self, TelemetryError> {
        let http = Client::builder()
            .user_agent(concat!("green-scheduler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TelemetryError::Client)?;

        let base_url =
            parse_base_url(&config.hostname).map_err(|source| TelemetryError::BaseUrl {
                hostname: config.hostname.clone(),
                source,
            })?;

        Ok(Self {
            tokens: TokenManager::new(config.token, http.clone()),
            http,
            base_url,
            metrics: SchedulerMetrics::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Aggregate cost, emissions and energy per matched entity
    pub async fn usage_by_entity(
        &self,
        window: &TimeWindow,
        params: &Params,
    ) -> Result<UsageByEntityResponse, TelemetryError> {
        let endpoint = Endpoint::UsageByEntity;
        let mut url = self.endpoint_url(endpoint, USAGE_BY_ENTITY_PATH)?;
        url.query_pairs_mut()
            .append_pair("start-time", &window.start_param())
            .append_pair("end-time", &window.end_param());
        params.append_to(&mut url);

        self.get_json(endpoint, url).await
    }

    /// Time-bucketed usage per matched entity
    pub async fn usage_series(
        &self,
        window: &TimeWindow,
        interval: &str,
        params: &Params,
    ) -> Result<UsageSeriesResponse, TelemetryError> {
        let endpoint = Endpoint::UsageSeries;
        let mut url = self.endpoint_url(endpoint, USAGE_SERIES_PATH)?;
        url.query_pairs_mut()
            .append_pair("start-time", &window.start_param())
            .append_pair("end-time", &window.end_param())
            .append_pair("interval", interval);
        params.append_to(&mut url);

        self.get_json(endpoint, url).await
    }

    fn endpoint_url(&self, endpoint: Endpoint, path: &str) -> Result<Url, TelemetryError> {
        self.base_url
            .join(path)
            .map_err(|source| TelemetryError::Url { endpoint, source })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: Url,
    ) -> Result<T, TelemetryError> {
        let token = self.tokens.token().await?;

        debug!(endpoint = %endpoint, url = %url, "Querying telemetry API");

        let result = match self.http.get(url).bearer_auth(token).send().await {
            Ok(response) => read_json(endpoint, response).await,
            Err(source) => Err(TelemetryError::Request { endpoint, source }),
        };

        self.metrics.record_telemetry_request(endpoint, result.is_ok());
        result
    }
}

fn parse_base_url(hostname: &str) -> Result<Url, url::ParseError> {
    if hostname.contains("://") {
        Url::parse(hostname)
    } else {
        Url::parse(&format!("https://{}", hostname))
    }
}
