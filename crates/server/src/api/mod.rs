use serde_json::Value;
use shared::{
    domain::QuoteRequest,
    error::{ApiError, ErrorCode, QuoteError},
    protocol::{
        AnalyticsEnvelope, EnqueueResponse, EventsPage, IngestResponse, JobKind, JobView,
        JobsOverview, SubmissionResult,
    },
};
use tracing::info;
use uuid::Uuid;

use crate::{event_log::EventLog, jobs::JobQueue};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
/// Longest `event_type` or `timestamp` the ingestion log accepts.
pub const MAX_EVENT_FIELD_LEN: usize = 50;

#[derive(Clone)]
pub struct ApiContext {
    pub events: EventLog,
    pub jobs: JobQueue,
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Validation, message)
}

/// Backend stub for quote requests: decodes, validates and acknowledges.
pub async fn accept_quote(_ctx: &ApiContext, body: &[u8]) -> Result<SubmissionResult, ApiError> {
    let req: QuoteRequest = serde_json::from_slice(body)
        .map_err(|err| invalid(format!("invalid quote request body: {err}")))?;
    req.validate()
        .map_err(|errors| ApiError::from(&QuoteError::Validation(errors)))?;
    info!(name = %req.name, email = %req.email, "quote request received");
    Ok(SubmissionResult { success: true })
}

fn check_event(envelope: &AnalyticsEnvelope) -> Result<(), ApiError> {
    for (field, value) in [
        ("event_type", &envelope.event_type),
        ("timestamp", &envelope.timestamp),
    ] {
        let len = value.chars().count();
        if len == 0 || len > MAX_EVENT_FIELD_LEN {
            return Err(invalid(format!(
                "{field} must be 1 to {MAX_EVENT_FIELD_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// Accepts one envelope or an array of them. Nothing is stored unless every
/// envelope is well formed. An empty body value counts as invalid JSON.
pub async fn ingest_events(ctx: &ApiContext, body: &[u8]) -> Result<IngestResponse, ApiError> {
    let data: Value = serde_json::from_slice(body).map_err(|_| invalid("invalid JSON"))?;

    let items = match data {
        Value::Array(items) if !items.is_empty() => items,
        Value::Object(map) if !map.is_empty() => vec![Value::Object(map)],
        Value::Array(_) | Value::Object(_) | Value::Null => return Err(invalid("invalid JSON")),
        _ => return Err(invalid("missing fields in event")),
    };

    let envelopes = items
        .into_iter()
        .map(serde_json::from_value::<AnalyticsEnvelope>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("missing fields in event"))?;
    envelopes.iter().try_for_each(check_event)?;

    let inserted = ctx.events.append(envelopes).await.len();
    info!(inserted, "inserted analytics events");
    Ok(IngestResponse { inserted })
}

pub async fn list_events(
    ctx: &ApiContext,
    page: Option<usize>,
    per_page: Option<usize>,
) -> EventsPage {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    EventsPage {
        events: ctx.events.page(page, per_page).await,
    }
}

/// Body: `{"job_type": "...", "data": ..., "options": {...}}`.
pub async fn enqueue_job(ctx: &ApiContext, body: &[u8]) -> Result<EnqueueResponse, ApiError> {
    let request: Value = serde_json::from_slice(body).map_err(|_| invalid("invalid JSON"))?;
    let Value::Object(mut request) = request else {
        return Err(invalid("no JSON data provided"));
    };
    if request.is_empty() {
        return Err(invalid("no JSON data provided"));
    }

    let job_type = match request.get("job_type") {
        Some(Value::String(job_type)) if !job_type.is_empty() => job_type.clone(),
        _ => return Err(invalid("job_type is required")),
    };
    let data = match request.remove("data") {
        Some(Value::Null) | None => return Err(invalid("data is required")),
        Some(data) => data,
    };
    let kind = JobKind::parse(&job_type)
        .ok_or_else(|| invalid(format!("unsupported job_type: {job_type}")))?;
    let options = request.remove("options").unwrap_or(Value::Null);

    ctx.jobs.enqueue(kind, data, options).await
}

pub async fn job_status(ctx: &ApiContext, raw_id: &str) -> Result<JobView, ApiError> {
    let not_found = || ApiError::new(ErrorCode::NotFound, "job not found");
    let id: Uuid = raw_id.parse().map_err(|_| not_found())?;
    ctx.jobs.job(id).await.ok_or_else(not_found)
}

pub async fn list_jobs(ctx: &ApiContext) -> JobsOverview {
    ctx.jobs.overview().await
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
