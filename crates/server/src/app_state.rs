use std::sync::{atomic::AtomicU64, Arc};

use anyhow::Context;
use client_core::{BackendClient, EventTracker, LogTracker, QuoteSubmitter, SimulatedSubmitter};
use shared::domain::{default_catalog, Product, ProductId};
use tokio::task::JoinHandle;
use tracing::info;

use crate::{api::ApiContext, config::Settings, pages::Pages};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) site: SiteContext,
}

/// Collaborators of the server-rendered quote pages.
#[derive(Clone)]
pub(crate) struct SiteContext {
    pub(crate) catalog: Vec<Product>,
    pub(crate) tracker: Arc<dyn EventTracker>,
    pub(crate) submitter: Arc<dyn QuoteSubmitter>,
    pub(crate) pages: Arc<Pages>,
    pub(crate) page_views: Arc<AtomicU64>,
}

impl SiteContext {
    /// Must be called from within a tokio runtime when an analytics url is set.
    pub(crate) fn from_settings(
        settings: &Settings,
    ) -> anyhow::Result<(Self, Option<JoinHandle<()>>)> {
        let submitter: Arc<dyn QuoteSubmitter> = match &settings.backend_url {
            Some(url) => {
                info!(backend_url = %url, "forwarding quote requests");
                Arc::new(BackendClient::new(url.as_str()).submitter()?)
            }
            None => {
                info!(
                    latency_ms = settings.simulated_latency_ms,
                    "using simulated quote backend"
                );
                Arc::new(SimulatedSubmitter::new(settings.simulated_latency()))
            }
        };

        let mut forwarder = None;
        let tracker: Arc<dyn EventTracker> = match &settings.analytics_url {
            Some(url) => {
                info!(analytics_url = %url, "forwarding analytics events");
                let (tracker, handle) = BackendClient::new(url.as_str())
                    .spawn_tracker(settings.tracker_queue_capacity)?;
                forwarder = Some(handle);
                Arc::new(tracker)
            }
            None => Arc::new(LogTracker),
        };

        let pages = Pages::new().context("failed to register page templates")?;

        Ok((
            Self {
                catalog: default_catalog(),
                tracker,
                submitter,
                pages: Arc::new(pages),
                page_views: Arc::default(),
            },
            forwarder,
        ))
    }

    pub(crate) fn product(&self, id: &ProductId) -> Option<&Product> {
        self.catalog.iter().find(|p| &p.id == id)
    }

    pub(crate) fn featured_product(&self) -> Option<&ProductId> {
        self.catalog.first().map(|p| &p.id)
    }
}
