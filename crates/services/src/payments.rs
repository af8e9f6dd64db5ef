use std::sync::Arc;

use chrono::Utc;

use workflow_core::audit::{AuditCategory, AuditContext};
use workflow_core::domain::job::JobId;
use workflow_core::domain::payment::{PaymentRequest, PaymentRequestId, PaymentStatus};
use workflow_core::errors::{ApplicationError, DomainError};
use workflow_core::forms::PaymentRequestForm;
use workflow_core::identity::{Actor, Capability};
use workflow_core::live::{ChangeEvent, PaymentStatusCounts};
use workflow_core::notify::Notification;
use workflow_core::payments::{PaymentSubmission, PaymentWorkflow};
use workflow_db::repositories::{JobRepository, PaymentRepository};

use crate::context::{Attempt, AuditSubject, Outcome, ServiceContext};

pub const SUBMITTED: &str = "Payment request submitted successfully";
pub const SUBMITTED_FLAGGED: &str =
    "Payment request has been flagged for review due to potential anomalies";
pub const SUBMIT_FAILED: &str = "Failed to submit payment request";
pub const APPROVED: &str = "Payment request approved";
pub const APPROVE_FAILED: &str = "Failed to approve payment";
pub const REJECTED: &str = "Payment request rejected";
pub const REJECT_FAILED: &str = "Failed to reject payment";
pub const UNKNOWN_JOB: &str = "The selected job no longer exists";

impl AuditSubject for PaymentSubmission {
    fn subject_id(&self) -> String {
        self.request.id.to_string()
    }
}

impl AuditSubject for PaymentRequest {
    fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    jobs: Arc<dyn JobRepository>,
    workflow: PaymentWorkflow,
    context: ServiceContext,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        jobs: Arc<dyn JobRepository>,
        workflow: PaymentWorkflow,
        context: ServiceContext,
    ) -> Self {
        Self { payments, jobs, workflow, context }
    }

    /// Creates a request from the form. The form is cleared only when the request was stored.
    pub async fn submit(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        job_id: Option<JobId>,
        form: &mut PaymentRequestForm,
    ) -> Outcome<PaymentSubmission> {
        let result = self.try_submit(actor, job_id, form).await;
        if result.is_ok() {
            form.reset();
        }

        self.context.conclude(
            Attempt {
                audit,
                event_type: "payment.submit",
                category: AuditCategory::Payment,
                subject_id: None,
                failure_message: SUBMIT_FAILED,
            },
            result,
            |submission| {
                if submission.assessment.flagged {
                    Notification::warning(SUBMITTED_FLAGGED)
                } else {
                    Notification::success(SUBMITTED)
                }
            },
        )
    }

    async fn try_submit(
        &self,
        actor: &Actor,
        job_id: Option<JobId>,
        form: &PaymentRequestForm,
    ) -> Result<PaymentSubmission, ApplicationError> {
        let submission = self.workflow.submit(actor, job_id, form, Utc::now())?;
        if let Some(job_id) = &submission.request.job_id {
            if self.jobs.find_by_id(job_id).await?.is_none() {
                return Err(DomainError::Validation(UNKNOWN_JOB.to_string()).into());
            }
        }

        self.payments.insert(&submission.request).await?;
        self.context.hub.payments.publish(ChangeEvent::Inserted(submission.request.clone()));
        Ok(submission)
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        id: &PaymentRequestId,
        note: Option<&str>,
        expected_version: Option<u32>,
    ) -> Outcome<PaymentRequest> {
        let result = self.try_approve(actor, id, note, expected_version).await;

        self.context.conclude(
            Attempt {
                audit,
                event_type: "payment.approve",
                category: AuditCategory::Payment,
                subject_id: Some(id.to_string()),
                failure_message: APPROVE_FAILED,
            },
            result,
            |_| Notification::success(APPROVED),
        )
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        id: &PaymentRequestId,
        reason: &str,
        expected_version: Option<u32>,
    ) -> Outcome<PaymentRequest> {
        let result = self.try_reject(actor, id, reason, expected_version).await;

        self.context.conclude(
            Attempt {
                audit,
                event_type: "payment.reject",
                category: AuditCategory::Payment,
                subject_id: Some(id.to_string()),
                failure_message: REJECT_FAILED,
            },
            result,
            |_| Notification::success(REJECTED),
        )
    }

    async fn try_approve(
        &self,
        actor: &Actor,
        id: &PaymentRequestId,
        note: Option<&str>,
        expected_version: Option<u32>,
    ) -> Result<PaymentRequest, ApplicationError> {
        self.workflow.authorize_review(actor)?;
        self.transition(id, expected_version, |request| {
            self.workflow.approve(actor, request, note, Utc::now())
        })
        .await
    }

    async fn try_reject(
        &self,
        actor: &Actor,
        id: &PaymentRequestId,
        reason: &str,
        expected_version: Option<u32>,
    ) -> Result<PaymentRequest, ApplicationError> {
        self.workflow.authorize_review(actor)?;
        self.workflow.validate_rejection_reason(reason)?;
        self.transition(id, expected_version, |request| {
            self.workflow.reject(actor, request, reason, Utc::now())
        })
        .await
    }

    /// Load, check the caller's version, apply, then write only over the version that was read.
    async fn transition(
        &self,
        id: &PaymentRequestId,
        expected_version: Option<u32>,
        apply: impl FnOnce(&mut PaymentRequest) -> Result<(), DomainError>,
    ) -> Result<PaymentRequest, ApplicationError> {
        let mut request = self
            .payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("payment request {id}")))?;

        let loaded_version = request.version;
        if let Some(expected) = expected_version {
            if expected != loaded_version {
                return Err(ApplicationError::Conflict(format!(
                    "payment request {id} is at version {loaded_version}, expected {expected}"
                )));
            }
        }

        apply(&mut request)?;
        self.payments.update_versioned(&request, loaded_version).await?;
        self.context.hub.payments.publish(ChangeEvent::Updated(request.clone()));
        Ok(request)
    }

    pub async fn get(
        &self,
        actor: &Actor,
        id: &PaymentRequestId,
    ) -> Result<PaymentRequest, ApplicationError> {
        actor.authorize(Capability::ViewPayments)?;
        self.payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("payment request {id}")))
    }

    /// Newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, ApplicationError> {
        actor.authorize(Capability::ViewPayments)?;
        Ok(self.payments.list(status).await?)
    }

    pub async fn summary(&self, actor: &Actor) -> Result<PaymentStatusCounts, ApplicationError> {
        let requests = self.list(actor, None).await?;
        Ok(PaymentStatusCounts::tally(&requests))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use workflow_core::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use workflow_core::domain::job::{Job, JobId, JobStatus};
    use workflow_core::domain::payment::PaymentStatus;
    use workflow_core::errors::{ApplicationError, DomainError};
    use workflow_core::forms::PaymentRequestForm;
    use workflow_core::identity::{AccountDirectory, Actor, Role};
    use workflow_core::live::{ChangeEvent, PaymentBoard};
    use workflow_core::notify::{InMemoryNotifier, NotificationKind};
    use workflow_core::payments::PaymentWorkflow;
    use workflow_db::repositories::{
        InMemoryJobRepository, InMemoryPaymentRepository, JobRepository, PaymentRepository,
    };
    use workflow_db::ChangeHub;

    use super::{PaymentService, APPROVED, SUBMITTED_FLAGGED, SUBMIT_FAILED};
    use crate::context::ServiceContext;

    struct Harness {
        service: PaymentService,
        payments: Arc<InMemoryPaymentRepository>,
        hub: ChangeHub,
        audit: InMemoryAuditSink,
        notifier: InMemoryNotifier,
    }

    async fn harness() -> Harness {
        let payments = Arc::new(InMemoryPaymentRepository::default());
        let jobs = Arc::new(InMemoryJobRepository::default());
        let now = Utc::now();
        jobs.insert(&Job {
            id: JobId("JOB-1".to_string()),
            title: "Haul".to_string(),
            description: "Gravel".to_string(),
            location: "Quarry".to_string(),
            budget: Decimal::ZERO,
            status: JobStatus::InProgress,
            assigned_to: None,
            due_date: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("seed job");

        let hub = ChangeHub::default();
        let audit = InMemoryAuditSink::default();
        let notifier = InMemoryNotifier::default();
        let context =
            ServiceContext::new(hub.clone(), Arc::new(audit.clone()), Arc::new(notifier.clone()));
        let service =
            PaymentService::new(payments.clone(), jobs, PaymentWorkflow::default(), context);
        Harness { service, payments, hub, audit, notifier }
    }

    fn actor(role: Role) -> Actor {
        AccountDirectory::demo().find_by_role(role).expect("demo account").actor()
    }

    fn trace() -> AuditContext {
        AuditContext::new("req-test", "tester")
    }

    fn job() -> Option<JobId> {
        Some(JobId("JOB-1".to_string()))
    }

    fn fuel_run(fuel: &str) -> PaymentRequestForm {
        PaymentRequestForm {
            title: "Fuel run".to_string(),
            fuel_cost: fuel.to_string(),
            mileage: "100".to_string(),
            ..PaymentRequestForm::default()
        }
    }

    #[tokio::test]
    async fn flagged_submission_warns_once_and_clears_the_form() {
        let h = harness().await;
        let mut form = fuel_run("80");

        let outcome = h.service.submit(&actor(Role::Leader), &trace(), job(), &mut form).await;

        let submission = outcome.result.expect("stored");
        assert_eq!(submission.request.status, PaymentStatus::Flagged);
        assert_eq!(outcome.notification.kind, NotificationKind::Warning);
        assert_eq!(outcome.notification.message, SUBMITTED_FLAGGED);
        assert_eq!(h.notifier.sent().len(), 1);
        assert_eq!(form, PaymentRequestForm::default());
        assert_eq!(h.audit.events_of_type("payment.submit")[0].outcome, AuditOutcome::Success);
    }

    #[tokio::test]
    async fn failed_submission_keeps_the_form_for_retry() {
        let h = harness().await;
        let mut form = fuel_run("40");
        form.title = "   ".to_string();

        let outcome = h.service.submit(&actor(Role::Leader), &trace(), job(), &mut form).await;

        assert!(outcome.result.expect_err("blank title").is_validation());
        assert_eq!(outcome.notification.kind, NotificationKind::Error);
        assert_eq!(form.fuel_cost, "40");
        assert!(h.payments.list(None).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn oversized_costs_are_refused_with_one_notification() {
        let h = harness().await;
        let mut form = fuel_run("79228162514264337593543950335");
        form.food_cost = "79228162514264337593543950335".to_string();

        let outcome = h.service.submit(&actor(Role::Leader), &trace(), job(), &mut form).await;

        assert!(outcome.result.expect_err("sum overflows").is_validation());
        assert_eq!(outcome.notification.message, "Amount is too large");
        assert_eq!(h.notifier.sent().len(), 1);
        assert_eq!(h.audit.events_of_type("payment.submit")[0].outcome, AuditOutcome::Rejected);
        assert!(h.payments.list(None).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn submission_against_a_missing_job_is_a_validation_error() {
        let h = harness().await;
        let mut form = fuel_run("40");

        let missing = h
            .service
            .submit(&actor(Role::Admin), &trace(), Some(JobId("JOB-404".into())), &mut form)
            .await;
        assert!(missing.result.expect_err("unknown job").is_validation());

        let absent = h.service.submit(&actor(Role::Admin), &trace(), None, &mut form).await;
        assert_eq!(absent.notification.message, "No job selected");
        assert_ne!(absent.notification.message, SUBMIT_FAILED);
    }

    #[tokio::test]
    async fn flagged_request_approved_with_note_moves_the_board_counters() {
        let h = harness().await;
        let mut subscription = h.hub.payments.subscribe();
        let mut board = PaymentBoard::default();

        let mut form = fuel_run("80");
        let created = h
            .service
            .submit(&actor(Role::Leader), &trace(), job(), &mut form)
            .await
            .into_result()
            .expect("submitted");
        board.apply(subscription.recv().await.expect("insert event"));
        let before = board.counts();
        assert_eq!(before.flagged, 1);

        let outcome = h
            .service
            .approve(
                &actor(Role::Admin),
                &trace(),
                &created.request.id,
                Some("verified with receipt"),
                Some(1),
            )
            .await;
        assert_eq!(outcome.notification.message, APPROVED);
        let approved = outcome.result.expect("approved");
        assert_eq!(approved.status, PaymentStatus::Completed);
        assert!(approved.notes.contains("Approval note: verified with receipt"));

        let event = subscription.recv().await.expect("update event");
        assert!(matches!(event, ChangeEvent::Updated(_)));
        board.apply(event);
        let after = board.counts();
        assert_eq!(after.flagged, before.flagged - 1);
        assert_eq!(after.completed, before.completed + 1);
        assert_eq!(after.pending, before.pending);
    }

    #[tokio::test]
    async fn second_approval_is_refused_and_leaves_the_record_alone() {
        let h = harness().await;
        let admin = actor(Role::Admin);
        let mut form = fuel_run("40");
        let created = h
            .service
            .submit(&actor(Role::Leader), &trace(), job(), &mut form)
            .await
            .into_result()
            .expect("submitted");

        let first = h
            .service
            .approve(&admin, &trace(), &created.request.id, None, None)
            .await
            .into_result()
            .expect("first approval");
        let second = h.service.approve(&admin, &trace(), &created.request.id, None, None).await;

        assert!(matches!(
            second.result,
            Err(ApplicationError::Domain(DomainError::InvalidPaymentTransition { .. }))
        ));
        let stored =
            h.payments.find_by_id(&created.request.id).await.expect("find").expect("present");
        assert_eq!(stored.approved_at, first.approved_at);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn stale_expected_version_is_a_conflict() {
        let h = harness().await;
        let mut form = fuel_run("40");
        let created = h
            .service
            .submit(&actor(Role::Leader), &trace(), job(), &mut form)
            .await
            .into_result()
            .expect("submitted");

        let outcome = h
            .service
            .reject(&actor(Role::Admin), &trace(), &created.request.id, "bad receipt", Some(7))
            .await;

        assert!(matches!(outcome.result, Err(ApplicationError::Conflict(_))));
        assert_eq!(
            outcome.notification.message,
            "This record was changed by someone else. Refresh and try again."
        );
    }

    #[tokio::test]
    async fn blank_rejection_reason_never_touches_the_record() {
        let h = harness().await;
        let mut form = fuel_run("40");
        let created = h
            .service
            .submit(&actor(Role::Leader), &trace(), job(), &mut form)
            .await
            .into_result()
            .expect("submitted");

        let blank =
            h.service.reject(&actor(Role::Admin), &trace(), &created.request.id, " ", None).await;
        assert_eq!(blank.notification.message, "Please provide a reason for rejection");

        let rejected = h
            .service
            .reject(&actor(Role::Admin), &trace(), &created.request.id, "bad receipt", None)
            .await
            .into_result()
            .expect("rejected");
        assert_eq!(rejected.status, PaymentStatus::Failed);
        assert_eq!(rejected.version, 2);
        assert!(rejected.notes.ends_with("Rejection reason: bad receipt"));
    }

    #[tokio::test]
    async fn non_admins_cannot_review_even_through_the_service() {
        let h = harness().await;
        let mut form = fuel_run("40");
        let created = h
            .service
            .submit(&actor(Role::Leader), &trace(), job(), &mut form)
            .await
            .into_result()
            .expect("submitted");

        for role in [Role::Leader, Role::Checker, Role::Worker] {
            let outcome =
                h.service.approve(&actor(role), &trace(), &created.request.id, None, None).await;
            assert!(outcome.result.expect_err("denied").is_unauthorized(), "{role}");
        }
        let summary = h.service.summary(&actor(Role::Checker)).await.expect("checker views");
        assert_eq!(summary.pending, 1);
        assert!(h.service.summary(&actor(Role::Worker)).await.is_err());
    }
}
