//! Server-rendered HTML for the public site. Each page body is a registered
//! handlebars template wrapped in the shared layout; values are HTML-escaped
//! by the registry.

use client_core::{FormPhase, QuoteFormState};
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;
use serde_json::{json, Value};
use shared::domain::{FormField, Product, ProductId};

const SITE_NAME: &str = "MyQuotes";

const STYLE: &str = "body{font-family:sans-serif;margin:0}\
nav{background:#2563eb;color:#fff;padding:1rem;display:flex;justify-content:space-between}\
nav a{color:#fff;text-decoration:none}\
main{padding:2rem;max-width:32rem;margin:0 auto}\
.card{border:1px solid #ddd;border-radius:.5rem;padding:1rem}\
.field-error,.form-error{color:#b91c1c}\
.confirmation{color:#16a34a}\
input{display:block;width:100%;padding:.5rem;margin:.5rem 0}";

const LAYOUT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{{title}} | {{site_name}}</title><style>{{{style}}}</style></head>
<body>
<nav><a href="/"><strong>{{site_name}}</strong></a>{{#if featured}}<a href="/product/{{featured}}">Get a Quote</a>{{/if}}</nav>
<main>
{{{body}}}
</main>
</body>
</html>
"#;

const PRODUCT_CARD_TEMPLATE: &str = r#"<div class="card"><h2>{{title}}</h2><p>{{summary}}</p><a href="/product/{{id}}"><button type="button">Get a Quote</button></a></div>"#;

const HOME_TEMPLATE: &str = r#"<h1>Welcome to {{site_name}}</h1>
{{#each products}}
{{> product_card}}
{{/each}}"#;

const FORM_FIELD_TEMPLATE: &str = r#"<input type="{{kind}}" name="{{name}}" placeholder="{{placeholder}}" value="{{value}}" required>{{#if error}}<p class="field-error">{{error}}</p>{{/if}}"#;

const QUOTE_TEMPLATE: &str = r#"<h1>Get a Quote for Product {{product_id}}</h1>
{{#if submitted}}
<p class="confirmation">Thank you! We'll be in touch soon.</p><p><a href="/checkout">Continue</a></p>
{{else}}
{{#if failure}}<p class="form-error" role="alert">We couldn't send your request: {{failure.reason}}</p>{{/if}}
<form method="post" action="/product/{{product_id}}">{{#each fields}}{{> form_field}}{{/each}}<button type="submit">{{#if failure.retryable}}Try again{{else}}Submit{{/if}}</button></form>
{{/if}}"#;

const CHECKOUT_TEMPLATE: &str = r#"<h1>Checkout</h1>
<p>Thanks for submitting your quote request.</p>
<p>We'll review your information and follow up shortly with more details.</p>"#;

const VIEWS_TEMPLATE: &str = r#"<h1>This page has been viewed {{count}} times.</h1>"#;

const NOT_FOUND_TEMPLATE: &str =
    r#"<h1>Page not found</h1><p><a href="/">Back to the home page</a></p>"#;

#[derive(Serialize)]
struct FieldView<'a> {
    kind: &'static str,
    name: &'static str,
    placeholder: &'static str,
    value: &'a str,
    error: Option<&'a str>,
}

fn field_view(state: &QuoteFormState, field: FormField) -> FieldView<'_> {
    let (kind, placeholder) = match field {
        FormField::Name => ("text", "Your name"),
        FormField::Email => ("email", "Your email"),
    };
    FieldView {
        kind,
        name: field.as_str(),
        placeholder,
        value: state.draft().get(field),
        error: state.field_error(field),
    }
}

pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        for (name, template) in [
            ("layout", LAYOUT_TEMPLATE),
            ("product_card", PRODUCT_CARD_TEMPLATE),
            ("home", HOME_TEMPLATE),
            ("form_field", FORM_FIELD_TEMPLATE),
            ("quote", QUOTE_TEMPLATE),
            ("checkout", CHECKOUT_TEMPLATE),
            ("views", VIEWS_TEMPLATE),
            ("not_found", NOT_FOUND_TEMPLATE),
        ] {
            registry.register_template_string(name, template)?;
        }
        Ok(Self { registry })
    }

    fn page(
        &self,
        title: &str,
        featured: Option<&ProductId>,
        template: &str,
        data: &Value,
    ) -> Result<String, RenderError> {
        let body = self.registry.render(template, data)?;
        self.registry.render(
            "layout",
            &json!({
                "title": title,
                "site_name": SITE_NAME,
                "style": STYLE,
                "featured": featured,
                "body": body,
            }),
        )
    }

    pub fn home(&self, catalog: &[Product]) -> Result<String, RenderError> {
        let data = json!({ "site_name": SITE_NAME, "products": catalog });
        self.page("Home", catalog.first().map(|p| &p.id), "home", &data)
    }

    pub fn quote_page(
        &self,
        state: &QuoteFormState,
        featured: Option<&ProductId>,
    ) -> Result<String, RenderError> {
        let failure = match state.phase() {
            FormPhase::Failed { reason, retryable } => {
                Some(json!({ "reason": reason, "retryable": retryable }))
            }
            _ => None,
        };
        let data = json!({
            "product_id": state.product_id(),
            "submitted": state.submitted(),
            "failure": failure,
            "fields": [
                field_view(state, FormField::Name),
                field_view(state, FormField::Email),
            ],
        });
        let title = if state.submitted() {
            "Quote received"
        } else {
            "Get a Quote"
        };
        self.page(title, featured, "quote", &data)
    }

    pub fn checkout(&self, featured: Option<&ProductId>) -> Result<String, RenderError> {
        self.page("Checkout", featured, "checkout", &json!({}))
    }

    pub fn views(&self, count: u64, featured: Option<&ProductId>) -> Result<String, RenderError> {
        self.page("Page views", featured, "views", &json!({ "count": count }))
    }

    pub fn not_found(&self, featured: Option<&ProductId>) -> Result<String, RenderError> {
        self.page("Not found", featured, "not_found", &json!({}))
    }
}

#[cfg(test)]
#[path = "tests/pages_tests.rs"]
mod tests;
