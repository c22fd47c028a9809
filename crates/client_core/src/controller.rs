//! Quote form state machine.
//!
//! `QuoteFormState` is a plain value; every change goes through
//! [`QuoteFormState::apply`]. `QuoteFormController` runs the submission
//! sequence around it and publishes each new state to subscribers.

use std::{future::Future, sync::Arc};

use shared::{
    domain::{FormField, ProductId, QuoteDraft},
    error::{FieldError, QuoteError},
    protocol::TrackedEvent,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    submission::{QuoteSubmitter, SubmissionOutcome},
    tracker::EventTracker,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPhase {
    Editing,
    Submitting,
    /// Terminal for the form instance.
    Submitted,
    Failed { reason: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    FieldChanged { field: FormField, value: String },
    ValidationFailed(Vec<FieldError>),
    SubmissionStarted,
    SubmissionResolved(SubmissionOutcome),
    SubmissionCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteFormState {
    product_id: ProductId,
    draft: QuoteDraft,
    phase: FormPhase,
    field_errors: Vec<FieldError>,
}

impl QuoteFormState {
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            draft: QuoteDraft::default(),
            phase: FormPhase::Editing,
            field_errors: Vec::new(),
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn draft(&self) -> &QuoteDraft {
        &self.draft
    }

    pub fn phase(&self) -> &FormPhase {
        &self.phase
    }

    pub fn submitted(&self) -> bool {
        self.draft.submitted()
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    pub fn field_error(&self, field: FormField) -> Option<&str> {
        self.field_errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Reason of the last failed submission, if the form is showing one.
    pub fn failure(&self) -> Option<&str> {
        match &self.phase {
            FormPhase::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn apply(mut self, action: FormAction) -> Self {
        if self.phase == FormPhase::Submitted {
            return self;
        }

        match action {
            FormAction::FieldChanged { field, value } => {
                self.draft.set(field, value);
                self.field_errors.retain(|e| e.field != field);
                if matches!(self.phase, FormPhase::Failed { .. }) {
                    self.phase = FormPhase::Editing;
                }
            }
            FormAction::ValidationFailed(errors) => {
                if self.phase != FormPhase::Submitting {
                    self.phase = FormPhase::Editing;
                    self.field_errors = errors;
                }
            }
            FormAction::SubmissionStarted => {
                if matches!(self.phase, FormPhase::Editing | FormPhase::Failed { .. }) {
                    self.phase = FormPhase::Submitting;
                    self.field_errors.clear();
                }
            }
            // Results arriving outside `Submitting` belong to an abandoned attempt.
            FormAction::SubmissionResolved(outcome) => {
                if self.phase == FormPhase::Submitting {
                    match outcome {
                        SubmissionOutcome::Success => {
                            self.phase = FormPhase::Submitted;
                            self.draft.mark_submitted();
                        }
                        SubmissionOutcome::Failure { reason, retryable } => {
                            self.phase = FormPhase::Failed { reason, retryable };
                        }
                    }
                }
            }
            FormAction::SubmissionCancelled => {
                if self.phase == FormPhase::Submitting {
                    self.phase = FormPhase::Editing;
                }
            }
        }
        self
    }
}

pub struct QuoteFormController {
    state: QuoteFormState,
    tracker: Arc<dyn EventTracker>,
    submitter: Arc<dyn QuoteSubmitter>,
    observers: watch::Sender<QuoteFormState>,
}

impl QuoteFormController {
    pub fn new(
        product_id: ProductId,
        tracker: Arc<dyn EventTracker>,
        submitter: Arc<dyn QuoteSubmitter>,
    ) -> Self {
        let state = QuoteFormState::new(product_id);
        let (observers, _) = watch::channel(state.clone());
        Self {
            state,
            tracker,
            submitter,
            observers,
        }
    }

    pub fn state(&self) -> &QuoteFormState {
        &self.state
    }

    pub fn into_state(self) -> QuoteFormState {
        self.state
    }

    /// Receives every state the controller moves through.
    pub fn subscribe(&self) -> watch::Receiver<QuoteFormState> {
        self.observers.subscribe()
    }

    pub fn update_field(&mut self, field: FormField, value: impl Into<String>) {
        self.dispatch(FormAction::FieldChanged {
            field,
            value: value.into(),
        });
    }

    fn dispatch(&mut self, action: FormAction) {
        self.state = self.state.clone().apply(action);
        self.observers.send_replace(self.state.clone());
    }

    pub async fn submit(&mut self) -> Result<(), QuoteError> {
        self.submit_or_cancel(std::future::pending::<()>()).await
    }

    /// Like [`submit`](Self::submit), but abandons the in-flight request as
    /// soon as `cancel` completes. The request's result is discarded and the
    /// form goes back to editing.
    pub async fn submit_or_cancel<F>(&mut self, cancel: F) -> Result<(), QuoteError>
    where
        F: Future<Output = ()>,
    {
        if self.state.submitted() {
            debug!(product_id = %self.state.product_id, "quote already submitted");
            return Ok(());
        }

        let request = self.state.draft.snapshot();
        if let Err(errors) = request.validate() {
            debug!(product_id = %self.state.product_id, count = errors.len(), "quote form invalid");
            self.dispatch(FormAction::ValidationFailed(errors.clone()));
            return Err(QuoteError::Validation(errors));
        }

        let product_id = self.state.product_id.clone();
        self.tracker.track(TrackedEvent::QuoteRequestSubmitted {
            name: request.name.clone(),
            email: request.email.clone(),
            product_id: product_id.clone(),
        });
        self.dispatch(FormAction::SubmissionStarted);

        let submitter = Arc::clone(&self.submitter);
        let outcome = tokio::select! {
            biased;
            _ = cancel => None,
            outcome = submitter.submit_quote(&request) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            info!(%product_id, "quote submission cancelled");
            self.dispatch(FormAction::SubmissionCancelled);
            return Err(QuoteError::Cancelled);
        };

        self.dispatch(FormAction::SubmissionResolved(outcome.clone()));
        match outcome {
            SubmissionOutcome::Success => {
                info!(%product_id, "quote request submitted");
                Ok(())
            }
            SubmissionOutcome::Failure { reason, retryable } => {
                warn!(%product_id, %reason, retryable, "quote submission failed");
                self.tracker.track(TrackedEvent::QuoteRequestFailed {
                    product_id,
                    reason: reason.clone(),
                });
                Err(QuoteError::Submission { reason, retryable })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
