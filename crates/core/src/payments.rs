use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;
use crate::domain::payment::{PaymentRequest, PaymentRequestId, REJECTION_REASON_REQUIRED};
use crate::errors::DomainError;
use crate::forms::{PaymentRequestForm, AMOUNT_TOO_LARGE, JOB_REQUIRED};
use crate::fraud::{FraudAssessment, FraudDetector};
use crate::identity::{Actor, Capability};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    pub request: PaymentRequest,
    pub assessment: FraudAssessment,
}

/// Pure payment lifecycle rules. Persistence and fan-out live in the service layer.
#[derive(Clone, Debug, Default)]
pub struct PaymentWorkflow {
    detector: FraudDetector,
}

impl PaymentWorkflow {
    pub fn new(detector: FraudDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &FraudDetector {
        &self.detector
    }

    pub fn submit(
        &self,
        actor: &Actor,
        job_id: Option<JobId>,
        form: &PaymentRequestForm,
        at: DateTime<Utc>,
    ) -> Result<PaymentSubmission, DomainError> {
        actor.authorize(Capability::CreatePayment)?;
        let job_id = job_id.ok_or_else(|| DomainError::Validation(JOB_REQUIRED.to_string()))?;
        form.validate()?;

        let costs = form.costs()?;
        let amount =
            costs.total().ok_or_else(|| DomainError::Validation(AMOUNT_TOO_LARGE.to_string()))?;
        let assessment = self.detector.assess(&costs);
        let request = PaymentRequest {
            id: PaymentRequestId::generate(),
            title: form.title.trim().to_string(),
            job_id: Some(job_id),
            amount,
            costs,
            status: assessment.status(),
            notes: form.notes.trim().to_string(),
            created_by: actor.id.clone(),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            version: 1,
            created_at: at,
            updated_at: at,
        };

        Ok(PaymentSubmission { request, assessment })
    }

    pub fn authorize_review(&self, actor: &Actor) -> Result<(), DomainError> {
        actor.authorize(Capability::ReviewPayment)
    }

    /// Checked before anything is loaded so a blank reason never reaches storage.
    pub fn validate_rejection_reason(&self, reason: &str) -> Result<(), DomainError> {
        if reason.trim().is_empty() {
            return Err(DomainError::Validation(REJECTION_REASON_REQUIRED.to_string()));
        }
        Ok(())
    }

    pub fn approve(
        &self,
        actor: &Actor,
        request: &mut PaymentRequest,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.authorize_review(actor)?;
        request.approve(&actor.id, note, at)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        request: &mut PaymentRequest,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.authorize_review(actor)?;
        self.validate_rejection_reason(reason)?;
        request.reject(&actor.id, reason, at)
    }
}
