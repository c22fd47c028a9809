use super::*;
use axum::{body, body::Body, http::Request};
use client_core::{BackendClient, MemoryTracker, QuoteSubmitter, SimulatedSubmitter};
use shared::{
    domain::default_catalog,
    protocol::{JobStatus, TrackedEvent},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

use crate::{jobs::JobQueueConfig, pages::Pages};

fn app_with(submitter: Arc<dyn QuoteSubmitter>) -> (Router, MemoryTracker, ApiContext) {
    let tracker = MemoryTracker::default();
    let (jobs, _worker) = JobQueue::spawn(JobQueueConfig {
        capacity: 8,
        history: 10,
        timeout: Duration::from_secs(30),
    });
    let api = ApiContext {
        events: EventLog::new(100),
        jobs,
    };
    let site = SiteContext {
        catalog: default_catalog(),
        tracker: Arc::new(tracker.clone()),
        submitter,
        pages: Arc::new(Pages::new().expect("templates")),
        page_views: Arc::default(),
    };
    let app = build_router(Arc::new(AppState {
        api: api.clone(),
        site,
    }));
    (app, tracker, api)
}

fn test_app() -> (Router, MemoryTracker, ApiContext) {
    app_with(Arc::new(SimulatedSubmitter::new(Duration::ZERO)))
}

async fn unreachable_server_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

async fn body_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

fn form_post(uri: &str, body: &'static str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request")
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _tracker, _api) = test_app();
    let response = app.oneshot(get_request("/healthz")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn views_page_counts_each_visit() {
    let (app, _tracker, _api) = test_app();
    for expected in ["viewed 1 times", "viewed 2 times"] {
        let response = app
            .clone()
            .oneshot(get_request("/views"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(expected));
    }
}

#[tokio::test]
async fn home_and_product_pages_render() {
    let (app, tracker, _api) = test_app();

    let home = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(home.status(), StatusCode::OK);
    assert!(body_text(home).await.contains(r#"href="/product/1""#));

    let form = app
        .clone()
        .oneshot(
            Request::get("/product/1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(form.status(), StatusCode::OK);
    assert!(body_text(form).await.contains("Get a Quote for Product 1"));

    let missing = app
        .oneshot(
            Request::get("/product/not%20valid")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(tracker.events().is_empty());
}

#[tokio::test]
async fn submitting_quote_form_tracks_and_confirms() {
    let (app, tracker, _api) = test_app();
    let response = app
        .oneshot(form_post(
            "/product/1",
            "name=Ada&email=ada%40example.com",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Thank you! We'll be in touch soon."));
    assert!(!html.contains("<form"));

    assert_eq!(
        tracker.events(),
        vec![TrackedEvent::QuoteRequestSubmitted {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            product_id: ProductId("1".into()),
        }]
    );
}

#[tokio::test]
async fn invalid_quote_form_is_rerendered_with_inline_errors() {
    let (app, tracker, _api) = test_app();
    let response = app
        .oneshot(form_post("/product/1", "name=%3Cb%3EAda%3C%2Fb%3E"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("email is required"));
    assert!(html.contains(r#"value="&lt;b&gt;Ada&lt;/b&gt;""#));
    assert!(tracker.events().is_empty());
}

#[tokio::test]
async fn failed_submission_shows_retry() {
    let backend = BackendClient::new(unreachable_server_url().await);
    let (app, tracker, _api) = app_with(Arc::new(backend.submitter().expect("submitter")));

    let response = app
        .oneshot(form_post(
            "/product/1",
            "name=Ada&email=ada%40example.com",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let html = body_text(response).await;
    assert!(html.contains("We couldn't send your request"));
    assert!(html.contains(">Try again</button>"));
    assert!(html.contains(r#"value="ada@example.com""#));

    let names: Vec<_> = tracker.events().iter().map(|e| e.event_name()).collect();
    assert_eq!(names, vec!["quote_request_submitted", "quote_request_failed"]);
}

#[tokio::test]
async fn site_submits_through_its_own_backend_stub() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let server_url = format!("http://{}", listener.local_addr().expect("addr"));
    let backend = BackendClient::new(server_url.as_str());
    let (app, _tracker, _api) = app_with(Arc::new(backend.submitter().expect("submitter")));
    tokio::spawn({
        let app = app.clone();
        async move {
            axum::serve(listener, app).await.expect("serve");
        }
    });

    let response = app
        .oneshot(form_post(
            "/product/1",
            "name=Ada&email=ada%40example.com",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Thank you!"));
}

#[tokio::test]
async fn checkout_tracks_visit() {
    let (app, tracker, _api) = test_app();
    let response = app
        .oneshot(
            Request::get("/checkout")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Thanks for submitting your quote request."));
    assert_eq!(tracker.events(), vec![TrackedEvent::VisitedCheckout]);
}

#[tokio::test]
async fn quote_api_validates_requests() {
    let (app, _tracker, _api) = test_app();

    let ok = Request::post("/api/quotes")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "name": "Ada", "email": "ada@example.com" }).to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(ok).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let result: SubmissionResult =
        serde_json::from_str(&body_text(response).await).expect("json");
    assert!(result.success);

    let bad = Request::post("/api/quotes")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "name": "Ada", "email": "" }).to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(bad).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = serde_json::from_str(&body_text(response).await).expect("json");
    assert!(err.message.contains("email is required"));
}

#[tokio::test]
async fn quote_api_answers_undecodable_bodies_with_api_error() {
    let (app, _tracker, _api) = test_app();
    let missing_email = json_post("/api/quotes", json!({ "name": "Ada" }));
    let response = app.clone().oneshot(missing_email).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.contains("email"));

    let garbage = Request::post("/api/quotes")
        .body(Body::from("{oops"))
        .expect("request");
    let response = app.oneshot(garbage).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn events_api_ingests_and_lists() {
    let (app, _tracker, api) = test_app();

    let post_event = Request::post("/api/events")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "event_type": "click",
                "timestamp": "2025-05-03T12:00:00Z",
                "metadata": { "x": 1 }
            })
            .to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(post_event).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let inserted: IngestResponse =
        serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(inserted.inserted, 1);

    let invalid = Request::post("/api/events")
        .body(Body::from("{oops"))
        .expect("request");
    let response = app.clone().oneshot(invalid).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let empty = json_post("/api/events", json!([]));
    let response = app.clone().oneshot(empty).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(err.message, "invalid JSON");

    let list = Request::get("/api/events?page=1&per_page=5")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(list).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let page: EventsPage = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].event_type, "click");
    assert_eq!(api.events.stored_count().await, 1);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let (app, _tracker, api) = test_app();
    let request = Request::post("/api/events")
        .header("content-type", "application/json")
        .body(Body::from(vec![b' '; MAX_REQUEST_BYTES + 1]))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(api.events.stored_count().await, 0);
}

#[tokio::test]
async fn job_routes_enqueue_report_and_list() {
    let (app, _tracker, _api) = test_app();
    let enqueue = json_post(
        "/api/enqueue",
        json!({
            "job_type": "text_processing",
            "data": "This is test text for processing",
            "options": { "operations": ["count", "tokenize"], "use_ray": false }
        }),
    );
    let response = app.clone().oneshot(enqueue).await.expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let queued: EnqueueResponse =
        serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(queued.status, JobStatus::Queued);

    let status_uri = format!("/api/job/{}", queued.job_id);
    let mut job: Option<JobView> = None;
    for _ in 0..500 {
        let response = app
            .clone()
            .oneshot(get_request(&status_uri))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let view: JobView = serde_json::from_str(&body_text(response).await).expect("json");
        if view.status == JobStatus::Finished {
            job = Some(view);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let job = job.expect("job finished");
    let result = job.result.expect("result");
    assert_eq!(result["results"]["word_count"], 6);

    let response = app
        .clone()
        .oneshot(get_request("/api/jobs"))
        .await
        .expect("response");
    let overview: JobsOverview = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(overview.completed_count, 1);
    assert_eq!(overview.completed_jobs[0].job_id, queued.job_id);

    let unsupported = json_post(
        "/api/enqueue",
        json!({ "job_type": "invalid_type", "data": "test data" }),
    );
    let response = app.clone().oneshot(unsupported).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get_request("/api/job/not-a-job"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(err.message, "job not found");
}
