use super::*;
use client_core::{FormAction, SubmissionOutcome};
use shared::domain::default_catalog;

fn product() -> ProductId {
    ProductId("1".into())
}

fn pages() -> Pages {
    Pages::new().expect("templates")
}

#[test]
fn home_links_each_product_card() {
    let html = pages().home(&default_catalog()).expect("render");
    assert!(html.contains("<title>Home | MyQuotes</title>"));
    assert!(html.contains("Welcome to MyQuotes"));
    assert!(html.contains("<h2>Insurance Quote</h2>"));
    assert!(html.contains(
        r#"<a href="/product/1"><button type="button">Get a Quote</button></a>"#
    ));
}

#[test]
fn editing_form_posts_back_to_product() {
    let state = QuoteFormState::new(product());
    let html = pages().quote_page(&state, Some(&product())).expect("render");
    assert!(html.contains("Get a Quote for Product 1"));
    assert!(html.contains(r#"<form method="post" action="/product/1">"#));
    assert!(html.contains(r#"name="email""#));
    assert!(html.contains(">Submit</button>"));
    assert!(!html.contains("form-error"));
}

#[test]
fn failed_form_offers_retry_and_keeps_escaped_values() {
    let state = QuoteFormState::new(product())
        .apply(FormAction::FieldChanged {
            field: FormField::Name,
            value: "<Ada>".into(),
        })
        .apply(FormAction::SubmissionStarted)
        .apply(FormAction::SubmissionResolved(SubmissionOutcome::Failure {
            reason: "backend <unreachable>".into(),
            retryable: true,
        }));
    let html = pages().quote_page(&state, None).expect("render");
    assert!(html.contains("We couldn't send your request: backend &lt;unreachable&gt;"));
    assert!(html.contains(">Try again</button>"));
    assert!(html.contains(r#"value="&lt;Ada&gt;""#));
    assert!(!html.contains("<Ada>"));
}

#[test]
fn non_retryable_failure_keeps_plain_submit() {
    let state = QuoteFormState::new(product())
        .apply(FormAction::SubmissionStarted)
        .apply(FormAction::SubmissionResolved(SubmissionOutcome::Failure {
            reason: "rejected".into(),
            retryable: false,
        }));
    let html = pages().quote_page(&state, None).expect("render");
    assert!(html.contains("We couldn't send your request: rejected"));
    assert!(html.contains(">Submit</button>"));
}

#[test]
fn submitted_form_shows_confirmation_only() {
    let state = QuoteFormState::new(product())
        .apply(FormAction::SubmissionStarted)
        .apply(FormAction::SubmissionResolved(SubmissionOutcome::Success));
    let html = pages().quote_page(&state, None).expect("render");
    assert!(html.contains("Thank you! We'll be in touch soon."));
    assert!(html.contains("<title>Quote received | MyQuotes</title>"));
    assert!(!html.contains("<form"));
}

#[test]
fn views_page_reports_count() {
    let html = pages().views(3, Some(&product())).expect("render");
    assert!(html.contains("This page has been viewed 3 times."));
    assert!(html.contains(r#"<a href="/product/1">Get a Quote</a>"#));
}
