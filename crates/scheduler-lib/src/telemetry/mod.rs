//! Client for the sustainability telemetry API
//!
//! This module provides:
//! - OAuth2 client-credentials token management with single-flight refresh
//! - Authenticated GET requests for aggregate and time-bucketed usage
//! - Response types whose nullable numeric fields read as zero

mod client;
mod response;
mod token;

pub use client::{ClientConfig, TelemetryClient, TimeWindow, USAGE_BY_ENTITY_PATH, USAGE_SERIES_PATH};
pub use response::{
    UsageByEntityResponse, UsageEntity, UsageSeriesItem, UsageSeriesResponse, UsageTotals,
};
pub use token::{TokenConfig, TokenInfo, TokenManager};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// Remote call a telemetry error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Token,
    UsageByEntity,
    UsageSeries,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Token => "token",
            Endpoint::UsageByEntity => "usage-by-entity",
            Endpoint::UsageSeries => "usage-series",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures talking to the token endpoint or the telemetry API
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid telemetry API host '{hostname}': {source}")]
    BaseUrl {
        hostname: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid {endpoint} URL: {source}")]
    Url {
        endpoint: Endpoint,
        #[source]
        source: url::ParseError,
    },

    #[error("{endpoint} request failed: {source}")]
    Request {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: Endpoint,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
}

impl TelemetryError {
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            TelemetryError::Client(_) | TelemetryError::BaseUrl { .. } => None,
            TelemetryError::Url { endpoint, .. }
            | TelemetryError::Request { endpoint, .. }
            | TelemetryError::Status { endpoint, .. }
            | TelemetryError::Decode { endpoint, .. } => Some(*endpoint),
        }
    }
}

/// Buffer the whole body, reject anything but 200, then decode as JSON
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: Endpoint,
    response: Response,
) -> Result<T, TelemetryError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| TelemetryError::Request { endpoint, source })?;

    if status != StatusCode::OK {
        return Err(TelemetryError::Status {
            endpoint,
            status,
            body,
        });
    }

    serde_json::from_str(&body).map_err(|source| TelemetryError::Decode { endpoint, source })
}
