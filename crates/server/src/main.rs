use std::{
    net::SocketAddr,
    sync::{atomic::Ordering, Arc},
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use client_core::QuoteFormController;
use handlebars::RenderError;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    domain::{FormField, ProductId},
    error::{ApiError, ErrorCode, QuoteError},
    protocol::{
        EnqueueResponse, EventsPage, IngestResponse, JobView, JobsOverview, SubmissionResult,
        TrackedEvent,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod event_log;
mod jobs;
mod pages;

use api::ApiContext;
use app_state::{AppState, SiteContext};
use config::load_settings;
use event_log::EventLog;
use jobs::JobQueue;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
struct QuoteFormInput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct ListEventsQuery {
    page: Option<usize>,
    per_page: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    let (site, _analytics_forwarder) = SiteContext::from_settings(&settings)?;
    let (jobs, _job_worker) = JobQueue::spawn(settings.job_queue());
    let api = ApiContext {
        events: EventLog::new(settings.max_stored_events),
        jobs,
    };

    let state = AppState { api, site };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/product/:id", get(product_form).post(submit_product_form))
        .route("/checkout", get(checkout))
        .route("/views", get(views))
        .route("/healthz", get(healthz))
        .route("/api/quotes", post(http_accept_quote))
        .route("/api/events", post(http_ingest_events).get(http_list_events))
        .route("/api/enqueue", post(http_enqueue_job))
        .route("/api/job/:id", get(http_job_status))
        .route("/api/jobs", get(http_list_jobs))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn render(page: Result<String, RenderError>) -> Result<Html<String>, Response> {
    page.map(Html).map_err(|err| {
        error!(%err, "failed to render page");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

async fn home(State(state): State<Arc<AppState>>) -> Result<Html<String>, Response> {
    render(state.site.pages.home(&state.site.catalog))
}

async fn checkout(State(state): State<Arc<AppState>>) -> Result<Html<String>, Response> {
    state.site.tracker.track(TrackedEvent::VisitedCheckout);
    render(state.site.pages.checkout(state.site.featured_product()))
}

async fn views(State(state): State<Arc<AppState>>) -> Result<Html<String>, Response> {
    let count = state.site.page_views.fetch_add(1, Ordering::Relaxed) + 1;
    render(state.site.pages.views(count, state.site.featured_product()))
}

fn not_found_page(state: &AppState) -> Response {
    match render(state.site.pages.not_found(state.site.featured_product())) {
        Ok(page) => (StatusCode::NOT_FOUND, page).into_response(),
        Err(response) => response,
    }
}

async fn not_found(State(state): State<Arc<AppState>>) -> Response {
    not_found_page(&state)
}

fn parse_product(state: &AppState, raw: &str) -> Result<ProductId, Response> {
    ProductId::parse(raw).ok_or_else(|| not_found_page(state))
}

async fn product_form(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, Response> {
    let product_id = parse_product(&state, &raw_id)?;
    if state.site.product(&product_id).is_none() {
        info!(%product_id, "quote form opened for product outside the catalog");
    }
    let controller = QuoteFormController::new(
        product_id,
        state.site.tracker.clone(),
        state.site.submitter.clone(),
    );
    render(
        state
            .site
            .pages
            .quote_page(controller.state(), state.site.featured_product()),
    )
}

/// One POST is one form instance: the posted fields are replayed into a
/// fresh controller which then runs the submission.
async fn submit_product_form(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Form(input): Form<QuoteFormInput>,
) -> Result<(StatusCode, Html<String>), Response> {
    let product_id = parse_product(&state, &raw_id)?;
    let mut controller = QuoteFormController::new(
        product_id,
        state.site.tracker.clone(),
        state.site.submitter.clone(),
    );
    controller.update_field(FormField::Name, input.name);
    controller.update_field(FormField::Email, input.email);

    let status = match controller.submit().await {
        Ok(()) => StatusCode::OK,
        Err(QuoteError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        Err(QuoteError::Submission { .. }) => StatusCode::BAD_GATEWAY,
        Err(error @ QuoteError::Cancelled) => {
            warn!(%error, "quote submission ended without a result");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let page = render(
        state
            .site
            .pages
            .quote_page(controller.state(), state.site.featured_product()),
    )?;
    Ok((status, page))
}

fn api_error(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn http_accept_quote(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<SubmissionResult> {
    let result = api::accept_quote(&state.api, &body)
        .await
        .map_err(api_error)?;
    Ok(Json(result))
}

async fn http_ingest_events(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<IngestResponse> {
    let response = api::ingest_events(&state.api, &body)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn http_list_events(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListEventsQuery>,
) -> Json<EventsPage> {
    Json(api::list_events(&state.api, q.page, q.per_page).await)
}

async fn http_enqueue_job(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, Json<ApiError>)> {
    let queued = api::enqueue_job(&state.api, &body)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::ACCEPTED, Json(queued)))
}

async fn http_job_status(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<JobView> {
    let job = api::job_status(&state.api, &raw_id)
        .await
        .map_err(api_error)?;
    Ok(Json(job))
}

async fn http_list_jobs(State(state): State<Arc<AppState>>) -> Json<JobsOverview> {
    Json(api::list_jobs(&state.api).await)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
