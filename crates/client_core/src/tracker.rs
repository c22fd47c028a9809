//! Analytics event tracking.
//!
//! Tracking is fire-and-forget: `track` never fails and never waits on the
//! network. Delivery problems are `TrackingFailure`s that only reach the log.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use reqwest::Client;
use shared::{
    error::TrackingFailure,
    protocol::{AnalyticsEnvelope, TrackedEvent},
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

pub trait EventTracker: Send + Sync {
    fn track(&self, event: TrackedEvent);
}

fn log_event(event: &TrackedEvent) {
    info!(
        event_name = event.event_name(),
        metadata = %event.metadata(),
        "tracked event"
    );
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl EventTracker for LogTracker {
    fn track(&self, event: TrackedEvent) {
        log_event(&event);
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryTracker {
    events: Arc<Mutex<Vec<TrackedEvent>>>,
}

impl MemoryTracker {
    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventTracker for MemoryTracker {
    fn track(&self, event: TrackedEvent) {
        log_event(&event);
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Logs each event and forwards it to an analytics ingestion endpoint from a
/// background task.
#[derive(Clone)]
pub struct HttpTracker {
    tx: mpsc::Sender<TrackedEvent>,
}

impl HttpTracker {
    /// The forwarder drains remaining events and exits once every clone of
    /// the tracker has been dropped.
    pub fn spawn(http: Client, endpoint: Url, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(forward_events(rx, http, endpoint));
        (Self { tx }, handle)
    }
}

impl EventTracker for HttpTracker {
    fn track(&self, event: TrackedEvent) {
        log_event(&event);
        let event_name = event.event_name();
        match self.tx.try_send(event) {
            Ok(()) => debug!(event_name, "queued analytics event"),
            Err(TrySendError::Full(_)) => {
                let error = TrackingFailure("analytics queue is full".into());
                warn!(event_name, %error, "dropping analytics event");
            }
            Err(TrySendError::Closed(_)) => {
                let error = TrackingFailure("analytics forwarder stopped".into());
                warn!(event_name, %error, "dropping analytics event");
            }
        }
    }
}

async fn forward_events(mut rx: mpsc::Receiver<TrackedEvent>, http: Client, endpoint: Url) {
    while let Some(event) = rx.recv().await {
        if let Err(error) = post_event(&http, &endpoint, &event).await {
            warn!(
                event_name = event.event_name(),
                %endpoint,
                %error,
                "failed to deliver analytics event"
            );
        }
    }
    debug!(%endpoint, "analytics forwarder finished");
}

async fn post_event(
    http: &Client,
    endpoint: &Url,
    event: &TrackedEvent,
) -> Result<(), TrackingFailure> {
    let envelope = AnalyticsEnvelope::from_event(event, Utc::now());
    http.post(endpoint.clone())
        .json(&envelope)
        .send()
        .await
        .map_err(|e| TrackingFailure(e.to_string()))?
        .error_for_status()
        .map_err(|e| TrackingFailure(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/tracker_tests.rs"]
mod tests;
