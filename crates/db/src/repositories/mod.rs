use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use workflow_core::domain::job::{Job, JobId, JobStatus};
use workflow_core::domain::payment::{PaymentRequest, PaymentRequestId, PaymentStatus};
use workflow_core::domain::resource::Resource;
use workflow_core::errors::ApplicationError;

pub mod job;
pub mod memory;
pub mod payment;
pub mod resource;

pub use job::SqlJobRepository;
pub use memory::{InMemoryJobRepository, InMemoryPaymentRepository, InMemoryResourceRepository};
pub use payment::SqlPaymentRepository;
pub use resource::SqlResourceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{id} is at version {actual}, expected {expected}")]
    VersionConflict { id: String, expected: u32, actual: u32 },
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            conflict @ RepositoryError::VersionConflict { .. } => {
                Self::Conflict(conflict.to_string())
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &PaymentRequestId,
    ) -> Result<Option<PaymentRequest>, RepositoryError>;

    async fn insert(&self, request: &PaymentRequest) -> Result<(), RepositoryError>;

    /// Writes `request` only if the stored row is still at `expected_version`.
    async fn update_versioned(
        &self,
        request: &PaymentRequest,
        expected_version: u32,
    ) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, RepositoryError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    async fn insert(&self, job: &Job) -> Result<(), RepositoryError>;
    async fn save(&self, job: &Job) -> Result<(), RepositoryError>;
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, RepositoryError>;
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn insert(&self, resource: &Resource) -> Result<(), RepositoryError>;
    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<Resource>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Resource>, RepositoryError>;
}

pub(crate) fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn decode_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| decode_timestamp(column, &value)).transpose()
}

pub(crate) fn decode_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn decode_version(raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw).map_err(|_| RepositoryError::Decode(format!("version `{raw}` out of range")))
}
