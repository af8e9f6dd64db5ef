use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;
use crate::identity::ActorId;

pub const BUDGET_NEGATIVE: &str = "Budget cannot be negative";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        Self(format!("JOB-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] =
        [JobStatus::Pending, JobStatus::InProgress, JobStatus::Completed, JobStatus::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" | "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub budget: Decimal,
    pub status: JobStatus,
    pub assigned_to: Option<ActorId>,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<ActorId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial edit of the descriptive job fields. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub budget: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.budget.is_none()
            && self.due_date.is_none()
    }
}

impl Job {
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self.status, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::InProgress, JobStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: JobStatus, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidJobTransition { from: self.status, to: next });
        }

        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: JobPatch, at: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(title) = patch.title {
            self.title = required_text("title", title)?;
        }
        if let Some(description) = patch.description {
            self.description = required_text("description", description)?;
        }
        if let Some(location) = patch.location {
            self.location = required_text("location", location)?;
        }
        if let Some(budget) = patch.budget {
            if budget < Decimal::ZERO {
                return Err(DomainError::Validation(BUDGET_NEGATIVE.to_string()));
            }
            self.budget = budget;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        self.updated_at = at;
        Ok(())
    }

    pub fn assign(&mut self, worker: ActorId, at: DateTime<Utc>) {
        self.assigned_to = Some(worker);
        self.updated_at = at;
    }
}

fn required_text(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("Job {field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}
