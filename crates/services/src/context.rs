use std::sync::Arc;

use tracing::{error, info, warn};

use workflow_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use workflow_core::errors::{ApplicationError, DomainError, InterfaceError};
use workflow_core::notify::{Notification, Notifier};
use workflow_db::ChangeHub;

/// Collaborators every service writes through.
#[derive(Clone)]
pub struct ServiceContext {
    pub hub: ChangeHub,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn Notifier>,
}

/// A finished mutation attempt and the single notification it produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome<T> {
    pub result: Result<T, ApplicationError>,
    pub notification: Notification,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, ApplicationError> {
        self.result
    }
}

pub(crate) trait AuditSubject {
    fn subject_id(&self) -> String;
}

pub(crate) struct Attempt<'a> {
    pub audit: &'a AuditContext,
    pub event_type: &'static str,
    pub category: AuditCategory,
    /// Known up front for edits, `None` for creations.
    pub subject_id: Option<String>,
    pub failure_message: &'static str,
}

impl ServiceContext {
    pub fn new(hub: ChangeHub, audit: Arc<dyn AuditSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self { hub, audit, notifier }
    }

    pub(crate) fn conclude<T: AuditSubject>(
        &self,
        attempt: Attempt<'_>,
        result: Result<T, ApplicationError>,
        on_success: impl FnOnce(&T) -> Notification,
    ) -> Outcome<T> {
        let notification = match &result {
            Ok(value) => {
                let notification = on_success(value);
                let subject_id = value.subject_id();
                info!(
                    event_name = attempt.event_type,
                    correlation_id = %attempt.audit.correlation_id,
                    actor_id = %attempt.audit.actor,
                    subject_id = %subject_id,
                    "workflow operation applied"
                );
                self.audit.emit(
                    attempt
                        .audit
                        .event(
                            Some(subject_id),
                            attempt.event_type,
                            attempt.category,
                            AuditOutcome::Success,
                        )
                        .with_metadata("notification", notification.message.clone()),
                );
                notification
            }
            Err(failure) => {
                let (outcome, notification) = classify(failure, attempt.failure_message);
                if outcome == AuditOutcome::Failed {
                    error!(
                        event_name = attempt.event_type,
                        correlation_id = %attempt.audit.correlation_id,
                        actor_id = %attempt.audit.actor,
                        error = %failure,
                        "workflow operation failed"
                    );
                } else {
                    warn!(
                        event_name = attempt.event_type,
                        correlation_id = %attempt.audit.correlation_id,
                        actor_id = %attempt.audit.actor,
                        error = %failure,
                        "workflow operation rejected"
                    );
                }
                self.audit.emit(
                    attempt
                        .audit
                        .event(attempt.subject_id, attempt.event_type, attempt.category, outcome)
                        .with_metadata("error", failure.to_string()),
                );
                notification
            }
        };

        self.notifier.notify(&notification);
        Outcome { result, notification }
    }
}

/// Validation messages are shown as written. Storage faults get the operation's generic notice.
fn classify(failure: &ApplicationError, failure_message: &str) -> (AuditOutcome, Notification) {
    match failure {
        ApplicationError::Domain(DomainError::Validation(message)) => {
            (AuditOutcome::Rejected, Notification::error(message.clone()))
        }
        ApplicationError::Domain(DomainError::Unauthorized { .. })
        | ApplicationError::Conflict(_) => (
            AuditOutcome::Rejected,
            Notification::error(InterfaceError::from(failure.clone()).user_message()),
        ),
        ApplicationError::Domain(_) | ApplicationError::NotFound(_) => {
            (AuditOutcome::Rejected, Notification::error(failure_message))
        }
        ApplicationError::Persistence(_) | ApplicationError::Configuration(_) => {
            (AuditOutcome::Failed, Notification::error(failure_message))
        }
    }
}
