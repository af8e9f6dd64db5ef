use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobId;
use crate::errors::DomainError;
use crate::identity::ActorId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentRequestId(pub String);

impl PaymentRequestId {
    pub fn generate() -> Self {
        Self(format!("PAY-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for PaymentRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Flagged,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Flagged,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Flagged => "flagged",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "flagged" => Some(Self::Flagged),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Open requests await an admin decision.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Flagged)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submitted costs. Mileage feeds the fraud rule only and is never summed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub food_cost: Decimal,
    pub labor_cost: Decimal,
    pub vehicle_cost: Decimal,
    pub fuel_cost: Decimal,
    pub mileage: Decimal,
}

impl CostBreakdown {
    /// `None` when the sum does not fit in a `Decimal`.
    pub fn total(&self) -> Option<Decimal> {
        self.food_cost
            .checked_add(self.labor_cost)?
            .checked_add(self.vehicle_cost)?
            .checked_add(self.fuel_cost)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: PaymentRequestId,
    pub title: String,
    pub job_id: Option<JobId>,
    pub amount: Decimal,
    pub costs: CostBreakdown,
    pub status: PaymentStatus,
    pub notes: String,
    pub created_by: ActorId,
    pub approved_by: Option<ActorId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<ActorId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.status.is_open() && next.is_terminal()
    }

    fn guard_transition(&self, next: PaymentStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            return Ok(());
        }

        Err(DomainError::InvalidPaymentTransition { from: self.status, to: next })
    }

    /// Marks the request completed. A blank note leaves the notes untouched.
    pub fn approve(
        &mut self,
        approver: &ActorId,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.guard_transition(PaymentStatus::Completed)?;

        if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
            self.notes = append_note(&self.notes, &format!("Approval note: {note}"));
        }
        self.status = PaymentStatus::Completed;
        self.approved_by = Some(approver.clone());
        self.approved_at = Some(at);
        self.bump(at);
        Ok(())
    }

    /// Marks the request failed. The reason is mandatory.
    pub fn reject(
        &mut self,
        rejecter: &ActorId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation(REJECTION_REASON_REQUIRED.to_string()));
        }
        self.guard_transition(PaymentStatus::Failed)?;

        self.notes = append_note(&self.notes, &format!("Rejection reason: {reason}"));
        self.status = PaymentStatus::Failed;
        self.rejected_by = Some(rejecter.clone());
        self.rejected_at = Some(at);
        self.bump(at);
        Ok(())
    }

    fn bump(&mut self, at: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = at;
    }
}

pub const REJECTION_REASON_REQUIRED: &str = "Please provide a reason for rejection";

/// Notes are append-only: new entries follow existing text after a blank line.
pub fn append_note(existing: &str, entry: &str) -> String {
    if existing.is_empty() {
        return entry.to_string();
    }
    format!("{existing}\n\n{entry}")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{append_note, CostBreakdown, PaymentRequest, PaymentRequestId, PaymentStatus};
    use crate::domain::job::JobId;
    use crate::errors::DomainError;
    use crate::identity::ActorId;

    fn request(status: PaymentStatus, notes: &str) -> PaymentRequest {
        let now = Utc::now();
        PaymentRequest {
            id: PaymentRequestId("PAY-1".to_string()),
            title: "Fuel run".to_string(),
            job_id: Some(JobId("JOB-1".to_string())),
            amount: Decimal::new(80, 0),
            costs: CostBreakdown { fuel_cost: Decimal::new(80, 0), ..CostBreakdown::default() },
            status,
            notes: notes.to_string(),
            created_by: ActorId("2".to_string()),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn admin() -> ActorId {
        ActorId("1".to_string())
    }

    #[test]
    fn total_excludes_mileage() {
        let costs = CostBreakdown {
            food_cost: Decimal::new(100, 0),
            labor_cost: Decimal::new(200, 0),
            vehicle_cost: Decimal::new(50, 0),
            fuel_cost: Decimal::new(60, 0),
            mileage: Decimal::new(100, 0),
        };

        assert_eq!(costs.total(), Some(Decimal::new(410, 0)));
    }

    #[test]
    fn total_reports_overflow_instead_of_wrapping() {
        let costs = CostBreakdown {
            food_cost: Decimal::MAX,
            labor_cost: Decimal::MAX,
            ..CostBreakdown::default()
        };

        assert_eq!(costs.total(), None);
    }

    #[test]
    fn approve_appends_note_after_existing_notes() {
        let mut payment = request(PaymentStatus::Flagged, "Receipts attached");
        let at = Utc::now();

        payment.approve(&admin(), Some("verified with receipt"), at).expect("flagged -> completed");

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.notes, "Receipts attached\n\nApproval note: verified with receipt");
        assert_eq!(payment.approved_by, Some(admin()));
        assert_eq!(payment.approved_at, Some(at));
        assert_eq!(payment.rejected_at, None);
        assert_eq!(payment.version, 2);
    }

    #[test]
    fn approve_without_note_keeps_notes() {
        let mut payment = request(PaymentStatus::Pending, "");
        payment.approve(&admin(), None, Utc::now()).expect("pending -> completed");
        assert_eq!(payment.notes, "");

        let mut payment = request(PaymentStatus::Pending, "original");
        payment.approve(&admin(), Some("   "), Utc::now()).expect("pending -> completed");
        assert_eq!(payment.notes, "original");
    }

    #[test]
    fn reject_requires_a_reason_and_leaves_record_untouched() {
        let mut payment = request(PaymentStatus::Pending, "");
        let before = payment.clone();

        let error = payment.reject(&admin(), "", Utc::now()).expect_err("empty reason");

        assert_eq!(error, DomainError::Validation("Please provide a reason for rejection".into()));
        assert_eq!(payment, before);
    }

    #[test]
    fn reject_sets_failed_and_appends_reason() {
        let mut payment = request(PaymentStatus::Pending, "");
        payment.reject(&admin(), "bad receipt", Utc::now()).expect("pending -> failed");

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.notes, "Rejection reason: bad receipt");
        assert_eq!(payment.rejected_by, Some(admin()));
        assert!(payment.rejected_at.is_some());
        assert!(payment.approved_by.is_none());
    }

    #[test]
    fn terminal_requests_cannot_transition_again() {
        let mut payment = request(PaymentStatus::Pending, "");
        let first = Utc::now();
        payment.approve(&admin(), None, first).expect("first approval");
        let after_first = payment.clone();

        let error = payment
            .approve(&admin(), Some("again"), first + Duration::minutes(5))
            .expect_err("second approval must be refused");

        assert!(matches!(error, DomainError::InvalidPaymentTransition { .. }));
        assert_eq!(payment, after_first);
        assert_eq!(payment.approved_at, Some(first));

        let mut failed = request(PaymentStatus::Failed, "");
        assert!(failed.approve(&admin(), None, Utc::now()).is_err());
        assert!(failed.reject(&admin(), "still bad", Utc::now()).is_err());
    }

    #[test]
    fn append_note_separates_entries_with_blank_line() {
        assert_eq!(append_note("", "one"), "one");
        assert_eq!(append_note("one", "two"), "one\n\ntwo");
    }
}
