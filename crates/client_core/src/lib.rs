//! Client-side quote flow: analytics tracking, quote submission and the
//! per-form controller that ties them together.

use anyhow::{Context, Result};
use reqwest::Client;
use shared::protocol::{EventsPage, IngestedEvent};
use tokio::task::JoinHandle;
use url::Url;

pub mod controller;
pub mod submission;
pub mod tracker;

pub use controller::{FormAction, FormPhase, QuoteFormController, QuoteFormState};
pub use submission::{HttpSubmitter, QuoteSubmitter, SimulatedSubmitter, SubmissionOutcome};
pub use tracker::{EventTracker, HttpTracker, LogTracker, MemoryTracker};

pub const QUOTES_PATH: &str = "api/quotes";
pub const EVENTS_PATH: &str = "api/events";

/// Resolves `path` against the server root, tolerating a trailing slash.
pub(crate) fn endpoint(server_url: &str, path: &str) -> Result<Url> {
    let base = format!("{}/", server_url.trim().trim_end_matches('/'));
    let base = Url::parse(&base).with_context(|| format!("invalid server url '{server_url}'"))?;
    base.join(path)
        .with_context(|| format!("failed to build '{path}' url from '{server_url}'"))
}

/// Thin handle on a running quote site.
pub struct BackendClient {
    http: Client,
    server_url: String,
}

impl BackendClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn health(&self) -> Result<()> {
        self.http
            .get(endpoint(&self.server_url, "healthz")?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn list_events(&self, page: u32, per_page: u32) -> Result<Vec<IngestedEvent>> {
        let res = self
            .http
            .get(endpoint(&self.server_url, EVENTS_PATH)?)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?
            .error_for_status()?;
        let body: EventsPage = res.json().await?;
        Ok(body.events)
    }

    pub fn submitter(&self) -> Result<HttpSubmitter> {
        HttpSubmitter::new(self.http.clone(), &self.server_url)
    }

    /// Must be called from within a tokio runtime.
    pub fn spawn_tracker(&self, capacity: usize) -> Result<(HttpTracker, JoinHandle<()>)> {
        let url = endpoint(&self.server_url, EVENTS_PATH)?;
        Ok(HttpTracker::spawn(self.http.clone(), url, capacity))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
