use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::FormField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: FormField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("invalid quote request: {}", describe_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("quote submission failed: {reason}")]
    Submission { reason: String, retryable: bool },
    #[error("quote submission cancelled")]
    Cancelled,
}

fn describe_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field.as_str(), e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Analytics sink failures. Never surfaced to the form.
#[derive(Debug, Error)]
#[error("analytics sink unreachable: {0}")]
pub struct TrackingFailure(pub String);

impl From<&QuoteError> for ApiError {
    fn from(value: &QuoteError) -> Self {
        let code = match value {
            QuoteError::Validation(_) => ErrorCode::Validation,
            QuoteError::Submission { .. } => ErrorCode::Unavailable,
            QuoteError::Cancelled => ErrorCode::Internal,
        };
        Self::new(code, value.to_string())
    }
}
