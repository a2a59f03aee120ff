//! OAuth2 client-credentials token management
//!
//! A [`TokenManager`] owns exactly one bearer token and its expiry. The state
//! sits behind an async mutex that stays locked for the whole
//! check-and-refresh sequence, so concurrent callers that all observe an
//! expired token wait for a single exchange instead of each issuing one.

use super::{read_json, Endpoint, TelemetryError};
use crate::observability::SchedulerMetrics;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info};

const GRANT_TYPE: &str = "client_credentials";

/// Upper bound on an accepted token lifetime (one year)
const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Token endpoint and client credentials
#[derive(Clone)]
pub struct TokenConfig {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
}

/// A bearer token together with the instant it stops being valid
#[derive(Clone)]
pub struct TokenInfo {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl TokenInfo {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Owns the bearer token used for telemetry API calls
pub struct TokenManager {
    config: TokenConfig,
    http: Client,
    state: Mutex<Option<TokenInfo>>,
    metrics: SchedulerMetrics,
}

impl TokenManager {
    /// Create a manager with no token; the first [`token`](Self::token) call
    /// performs the exchange.
    pub fn new(config: TokenConfig, http: Client) -> Self {
        Self {
            config,
            http,
            state: Mutex::new(None),
            metrics: SchedulerMetrics::new(),
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Return a valid bearer token, refreshing it first if it is unset or
    /// past its expiry.
    ///
    /// On refresh failure the previous (expired) state is left untouched and
    /// the error is returned.
    pub async fn token(&self) -> Result<String, TelemetryError> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        if let Some(info) = state.as_ref().filter(|info| !info.is_expired_at(now)) {
            return Ok(info.token.clone());
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *state = Some(fresh);
        Ok(token)
    }

    /// Expiry of the cached token, if one has been obtained
    pub async fn expiry(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.as_ref().map(|info| info.expiry)
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, TelemetryError> {
        let response = self
            .http
            .post(&self.config.url)
            .form(form)
            .send()
            .await
            .map_err(|source| TelemetryError::Request {
                endpoint: Endpoint::Token,
                source,
            })?;

        read_json(Endpoint::Token, response).await
    }

    async fn exchange(&self) -> Result<TokenInfo, TelemetryError> {
        debug!(url = %self.config.url, "Requesting access token");

        let form = [
            ("grant_type", GRANT_TYPE),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = match self.request_token(&form).await {
            Ok(response) => {
                self.metrics.record_telemetry_request(Endpoint::Token, true);
                response
            }
            Err(e) => {
                self.metrics.record_telemetry_request(Endpoint::Token, false);
                return Err(e);
            }
        };

        let lifetime = response.expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECS);
        let expiry = Utc::now() + Duration::seconds(lifetime);
        self.metrics.inc_token_refreshes();

        info!(
            token_type = response.token_type.as_deref().unwrap_or("unknown"),
            expires_in_secs = lifetime,
            "Obtained access token"
        );

        Ok(TokenInfo {
            token: response.access_token,
            expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::sync::Arc;

    fn manager(server: &mockito::ServerGuard) -> TokenManager {
        TokenManager::new(
            TokenConfig {
                url: format!("{}/oauth/token", server.url()),
                client_id: "scheduler".to_string(),
                client_secret: "s3cret".to_string(),
            },
            Client::new(),
        )
    }

    fn token_body(token: &str, expires_in: i64) -> String {
        format!(
            r#"{{"access_token": "{}", "token_type": "Bearer", "expires_in": {}}}"#,
            token, expires_in
        )
    }

    #[test]
    fn test_token_info_expiry() {
        let now = Utc::now();
        let info = TokenInfo {
            token: "t".to_string(),
            expiry: now,
        };
        assert!(!info.is_expired_at(now));
        assert!(info.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = TokenConfig {
            url: "https://sso.example.com/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "hunter2".to_string(),
        };
        let info = TokenInfo {
            token: "bearer-value".to_string(),
            expiry: Utc::now(),
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(!format!("{:?}", info).contains("bearer-value"));
    }

    #[tokio::test]
    async fn test_fresh_manager_refreshes_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "scheduler".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("tok-1", 3600))
            .expect(1)
            .create_async()
            .await;

        let tokens = manager(&server);
        assert!(tokens.expiry().await.is_none());

        assert_eq!(tokens.token().await.unwrap(), "tok-1");
        // cached: no second exchange
        assert_eq!(tokens.token().await.unwrap(), "tok-1");

        let expiry = tokens.expiry().await.unwrap();
        assert!(expiry > Utc::now() + Duration::seconds(3500));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(token_body("short-lived", 0))
            .expect(2)
            .create_async()
            .await;

        let tokens = manager(&server);
        tokens.token().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        tokens.token().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_200_leaves_manager_expired() {
        let mut server = mockito::Server::new_async().await;
        let denied = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_body("invalid_client")
            .expect(1)
            .create_async()
            .await;

        let tokens = manager(&server);
        let err = tokens.token().await.unwrap_err();
        match err {
            TelemetryError::Status {
                endpoint,
                status,
                body,
            } => {
                assert_eq!(endpoint, Endpoint::Token);
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "invalid_client");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(tokens.expiry().await.is_none());
        denied.assert_async().await;
    }

    #[tokio::test]
    async fn test_undecodable_token_response_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(r#"{"token": "missing fields"}"#)
            .create_async()
            .await;

        let tokens = manager(&server);
        assert!(matches!(
            tokens.token().await,
            Err(TelemetryError::Decode {
                endpoint: Endpoint::Token,
                ..
            })
        ));
        assert!(tokens.expiry().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_body(token_body("shared", 3600))
            .expect(1)
            .create_async()
            .await;

        let tokens = Arc::new(manager(&server));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tokens = Arc::clone(&tokens);
            handles.push(tokio::spawn(async move { tokens.token().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "shared");
        }

        mock.assert_async().await;
    }
}
