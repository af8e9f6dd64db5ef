use tracing::info;

use workflow_core::audit::{AuditEvent, AuditSink};
use workflow_core::notify::{Notification, Notifier};

/// Writes audit events as structured `tracing` records on the `audit` target.
#[derive(Clone, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        info!(
            target: "audit",
            event_name = %event.event_type,
            event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            actor_id = %event.actor,
            subject_id = event.subject_id.as_deref().unwrap_or("none"),
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = %metadata,
            "audit event"
        );
    }
}

/// HTTP callers read notifications from the response body; this keeps a log trail.
#[derive(Clone, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            event_name = "notification.sent",
            kind = ?notification.kind,
            message = %notification.message,
            "user notification"
        );
    }
}
