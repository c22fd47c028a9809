use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{EventId, ProductId};

/// Closed set of analytics events the site emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedEvent {
    QuoteRequestSubmitted {
        name: String,
        email: String,
        product_id: ProductId,
    },
    QuoteRequestFailed {
        product_id: ProductId,
        reason: String,
    },
    VisitedCheckout,
}

impl TrackedEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::QuoteRequestSubmitted { .. } => "quote_request_submitted",
            Self::QuoteRequestFailed { .. } => "quote_request_failed",
            Self::VisitedCheckout => "visited_checkout",
        }
    }

    pub fn metadata(&self) -> Value {
        match self {
            Self::QuoteRequestSubmitted {
                name,
                email,
                product_id,
            } => json!({ "name": name, "email": email, "productId": product_id }),
            Self::QuoteRequestFailed { product_id, reason } => {
                json!({ "productId": product_id, "reason": reason })
            }
            Self::VisitedCheckout => json!({}),
        }
    }
}

/// Body accepted by `POST /api/events`. The timestamp is stored as sent;
/// events emitted by this workspace use RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEnvelope {
    #[serde(alias = "eventName")]
    pub event_type: String,
    pub timestamp: String,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

fn empty_metadata() -> Value {
    json!({})
}

impl AnalyticsEnvelope {
    pub fn from_event(event: &TrackedEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: event.event_name().to_string(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            metadata: event.metadata(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedEvent {
    pub id: EventId,
    pub event_type: String,
    pub timestamp: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsPage {
    pub events: Vec<IngestedEvent>,
}

/// Response of `POST /api/quotes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    DataProcessing,
    TextProcessing,
}

impl JobKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "data_processing" => Some(Self::DataProcessing),
            "text_processing" => Some(Self::TextProcessing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

/// Response of `POST /api/enqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: JobStatus,
    /// Jobs waiting in the queue, this one included.
    pub position: usize,
}

/// Response of `GET /api/job/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    /// Zero-based place in the queue; 0 once the job has left it.
    pub queue_position: usize,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

/// Response of `GET /api/jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsOverview {
    pub queued_count: usize,
    pub failed_count: usize,
    pub completed_count: usize,
    pub queued_jobs: Vec<JobSummary>,
    pub failed_jobs: Vec<JobSummary>,
    pub completed_jobs: Vec<JobSummary>,
}
