//! AbuseIPDB reputation client.
//!
//! Queries the AbuseIPDB `check` endpoint for a single IP and returns its
//! `abuseConfidenceScore`. Every failure is logged here and handed back as a
//! [`FetchError`]; callers decide what a failure means for the request.
//!
//! ```text
//! GET <endpoint>?ipAddress=<ip>
//! Accept: application/json
//! Key: <api key>
//!
//! 200 {"data": {"abuseConfidenceScore": 75, ...}}
//! ```

use crate::config::AbuseIpDbConfig;
use crate::error::FetchError;
use crate::metrics;
use crate::telemetry::FetchTimer;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, error};

/// Remote source of IP reputation scores.
#[async_trait]
pub trait ReputationSource: Send + Sync {
    /// Fetch the current confidence score (0-100) for `ip`.
    ///
    /// Makes exactly one attempt; there are no retries.
    async fn fetch_score(&self, ip: IpAddr, api_key: &str) -> Result<u8, FetchError>;
}

/// Extract the confidence score from a success body.
///
/// The body must be a JSON object. Missing or null `data` or
/// `data.abuseConfidenceScore` scores 0; a score of the wrong type or
/// outside 0-100 is an error, never a rewritten value.
fn parse_score(body: &str) -> Result<u8, FetchError> {
    let parsed: Value = serde_json::from_str(body)?;
    if !parsed.is_object() {
        return Err(FetchError::Unexpected("body is not a JSON object".into()));
    }

    match parsed.get("data") {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Object(_)) => {}
        Some(_) => return Err(FetchError::Unexpected("`data` is not an object".into())),
    }

    let score = match parsed.pointer("/data/abuseConfidenceScore") {
        None | Some(Value::Null) => return Ok(0),
        Some(v) => serde_json::from_value::<i64>(v.clone())?,
    };

    u8::try_from(score)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| FetchError::Unexpected(format!("score {} outside 0-100", score)))
}

/// HTTP client for the AbuseIPDB v2 API.
pub struct AbuseIpDbClient {
    endpoint: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl AbuseIpDbClient {
    /// Create a new client from configuration.
    pub fn new(config: &AbuseIpDbConfig) -> Self {
        let timeout = config.timeout();
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("abusegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: config.endpoint.clone(),
            timeout,
            http_client,
        }
    }

    /// Issue the request and classify the outcome, without logging.
    async fn request(&self, ip: IpAddr, api_key: &str) -> Result<u8, FetchError> {
        let exchange = async {
            let response = self
                .http_client
                .get(&self.endpoint)
                .query(&[("ipAddress", ip.to_string())])
                .header(ACCEPT, "application/json")
                .header("Key", api_key)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_timeout() => return Err(FetchError::Timeout),
            Ok(Err(e)) => return Err(FetchError::Transport(e)),
            Err(_) => return Err(FetchError::Timeout),
        };

        if status.is_client_error() {
            let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
            return Err(FetchError::ClientRejected {
                status: status.as_u16(),
                body,
            });
        }

        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        parse_score(&body)
    }
}

#[async_trait]
impl ReputationSource for AbuseIpDbClient {
    async fn fetch_score(&self, ip: IpAddr, api_key: &str) -> Result<u8, FetchError> {
        let _timer = FetchTimer::start();

        match self.request(ip, api_key).await {
            Ok(score) => {
                debug!(ip = %ip, score = score, "AbuseIPDB score fetched");
                Ok(score)
            }
            Err(e) => {
                match &e {
                    FetchError::ClientRejected { status, body } => {
                        error!(ip = %ip, status = *status, error = %body, "AbuseIPDB client error");
                    }
                    FetchError::ServerError { status, body } => {
                        error!(ip = %ip, status = *status, error = %body, "AbuseIPDB server error");
                    }
                    other => {
                        error!(ip = %ip, code = other.error_code(), error = %other, "AbuseIPDB unspecified error");
                    }
                }
                metrics::record_fetch_failure(e.kind());
                Err(e)
            }
        }
    }
}
