use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::QuoteRequest,
    error::ApiError,
    protocol::SubmissionResult,
};
use tracing::{info, warn};
use url::Url;

use crate::{endpoint, QUOTES_PATH};

pub const DEFAULT_SIMULATED_LATENCY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success,
    Failure { reason: String, retryable: bool },
}

impl SubmissionOutcome {
    fn failure(reason: impl Into<String>, retryable: bool) -> Self {
        Self::Failure {
            reason: reason.into(),
            retryable,
        }
    }
}

/// Delivers a completed quote request to the backend.
#[async_trait]
pub trait QuoteSubmitter: Send + Sync {
    async fn submit_quote(&self, request: &QuoteRequest) -> SubmissionOutcome;
}

/// Stand-in backend: always accepts after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedSubmitter {
    latency: Duration,
}

impl SimulatedSubmitter {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedSubmitter {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_LATENCY)
    }
}

#[async_trait]
impl QuoteSubmitter for SimulatedSubmitter {
    async fn submit_quote(&self, request: &QuoteRequest) -> SubmissionOutcome {
        info!(
            name = %request.name,
            email = %request.email,
            latency_ms = self.latency.as_millis() as u64,
            "sending quote request to simulated backend"
        );
        tokio::time::sleep(self.latency).await;
        SubmissionOutcome::Success
    }
}

/// Posts quote requests to `{server_url}/api/quotes`.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    http: Client,
    endpoint: Url,
}

impl HttpSubmitter {
    pub fn new(http: Client, server_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            endpoint: endpoint(server_url, QUOTES_PATH)?,
        })
    }
}

#[async_trait]
impl QuoteSubmitter for HttpSubmitter {
    async fn submit_quote(&self, request: &QuoteRequest) -> SubmissionOutcome {
        let response = match self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(endpoint = %self.endpoint, %error, "quote backend unreachable");
                return SubmissionOutcome::failure(format!("backend unreachable: {error}"), true);
            }
        };

        let status = response.status();
        if status.is_client_error() {
            let reason = match response.json::<ApiError>().await {
                Ok(api_error) => api_error.message,
                Err(_) => format!("backend rejected the quote request ({status})"),
            };
            warn!(%status, %reason, "quote backend rejected request");
            return SubmissionOutcome::failure(reason, false);
        }
        if !status.is_success() {
            warn!(%status, "quote backend failed");
            return SubmissionOutcome::failure(format!("backend returned {status}"), true);
        }

        match response.json::<SubmissionResult>().await {
            Ok(SubmissionResult { success: true }) => SubmissionOutcome::Success,
            Ok(SubmissionResult { success: false }) => {
                SubmissionOutcome::failure("backend declined the quote request", true)
            }
            Err(error) => {
                warn!(%error, "malformed quote backend response");
                SubmissionOutcome::failure(format!("malformed backend response: {error}"), true)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
