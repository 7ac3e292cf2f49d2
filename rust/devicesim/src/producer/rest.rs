use crate::error::{Result, SimError};
use crate::orchestrator::SendResult;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use std::error::Error as _;
use std::time::Duration;

/// Raw outcome of an HTTP POST.
#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    pub body: String,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// JSON-over-HTTP delivery for devices that post straight to an ingestion
/// endpoint. Every send opens its own connection; nothing is kept idle.
#[derive(Clone)]
pub struct RestSender {
    client: reqwest::Client,
}

impl RestSender {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SimError::Configuration(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn post(&self, url: &str, body: &str) -> Result<RestResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| SimError::Send(describe_request_error(&e)))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(RestResponse { status, body })
    }

    /// Posts `body` to `url`. Transport failures surface as status 500.
    pub async fn send(&self, url: &str, body: &str) -> SendResult {
        match self.post(url, body).await {
            Ok(response) if response.is_success() => {
                debug!("POST {} answered {}", url, response.status);
                SendResult::ok(
                    format!("Delivered to {}", url),
                    Some(response.status),
                )
            }
            Ok(response) => {
                warn!("POST {} rejected with {}", url, response.status);
                let detail = if response.body.trim().is_empty() {
                    format!("HTTP {}", response.status)
                } else {
                    response.body
                };
                SendResult::failure("Endpoint rejected the data", detail, Some(response.status))
            }
            Err(e) => {
                warn!("POST {} failed: {}", url, e);
                SendResult::failure("Request failed", e.to_string(), Some(500))
            }
        }
    }
}

/// Flattens a reqwest error and its source chain into one line.
pub(crate) fn describe_request_error(error: &reqwest::Error) -> String {
    let mut description = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else if error.is_builder() {
        "invalid request".to_string()
    } else {
        "request failed".to_string()
    };

    let mut source = error.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}
