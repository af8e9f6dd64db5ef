use std::sync::Arc;

use chrono::Utc;

use workflow_core::audit::{AuditCategory, AuditContext};
use workflow_core::domain::job::{Job, JobId, JobPatch, JobStatus};
use workflow_core::errors::{ApplicationError, DomainError};
use workflow_core::forms::JobForm;
use workflow_core::identity::{AccountDirectory, Actor, ActorId, Capability};
use workflow_core::live::{ChangeEvent, JobStatusCounts};
use workflow_core::notify::Notification;
use workflow_db::repositories::JobRepository;

use crate::context::{Attempt, AuditSubject, Outcome, ServiceContext};

pub const CREATED: &str = "Job created successfully";
pub const CREATE_FAILED: &str = "Failed to create job";
pub const UPDATED: &str = "Job updated successfully";
pub const UPDATE_FAILED: &str = "Failed to update job";
pub const STATUS_UPDATED: &str = "Job status updated";
pub const STATUS_UPDATE_FAILED: &str = "Failed to update job status";
pub const ASSIGNED: &str = "Job assigned successfully";
pub const ASSIGN_FAILED: &str = "Failed to assign job";

impl AuditSubject for Job {
    fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    directory: AccountDirectory,
    context: ServiceContext,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        directory: AccountDirectory,
        context: ServiceContext,
    ) -> Self {
        Self { jobs, directory, context }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        form: &mut JobForm,
    ) -> Outcome<Job> {
        let result = self.try_create(actor, form).await;
        if result.is_ok() {
            *form = JobForm::default();
        }

        self.context.conclude(
            Attempt {
                audit,
                event_type: "job.create",
                category: AuditCategory::Job,
                subject_id: None,
                failure_message: CREATE_FAILED,
            },
            result,
            |_| Notification::success(CREATED),
        )
    }

    async fn try_create(&self, actor: &Actor, form: &JobForm) -> Result<Job, ApplicationError> {
        actor.authorize(Capability::CreateJob)?;
        let job = form.build(&actor.id, Utc::now())?;
        self.jobs.insert(&job).await?;
        self.context.hub.jobs.publish(ChangeEvent::Inserted(job.clone()));
        Ok(job)
    }

    /// Last write wins; job edits carry no version.
    pub async fn update(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        id: &JobId,
        patch: JobPatch,
    ) -> Outcome<Job> {
        let result = async {
            actor.authorize(Capability::UpdateJob)?;
            self.modify(id, |job| job.apply_patch(patch, Utc::now())).await
        };

        self.context.conclude(
            self.attempt(audit, "job.update", id, UPDATE_FAILED),
            result.await,
            |_| Notification::success(UPDATED),
        )
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        id: &JobId,
        next: JobStatus,
    ) -> Outcome<Job> {
        let result = async {
            actor.authorize(Capability::UpdateJobStatus)?;
            self.modify(id, |job| job.transition_to(next, Utc::now())).await
        };

        self.context.conclude(
            self.attempt(audit, "job.status_update", id, STATUS_UPDATE_FAILED),
            result.await,
            |_| Notification::success(STATUS_UPDATED),
        )
    }

    pub async fn assign(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        id: &JobId,
        worker: &ActorId,
    ) -> Outcome<Job> {
        let result = async {
            actor.authorize(Capability::AssignJob)?;
            let account = self.directory.find_by_id(worker).ok_or_else(|| {
                DomainError::Validation(format!("no active account with id `{worker}`"))
            })?;
            let worker = account.id.clone();
            self.modify(id, move |job| {
                job.assign(worker, Utc::now());
                Ok(())
            })
            .await
        };

        self.context.conclude(
            self.attempt(audit, "job.assign", id, ASSIGN_FAILED),
            result.await,
            |_| Notification::success(ASSIGNED),
        )
    }

    pub async fn get(&self, actor: &Actor, id: &JobId) -> Result<Job, ApplicationError> {
        actor.authorize(Capability::ViewJobs)?;
        self.load(id).await
    }

    /// Newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, ApplicationError> {
        actor.authorize(Capability::ViewJobs)?;
        Ok(self.jobs.list(status).await?)
    }

    pub async fn tally(&self, actor: &Actor) -> Result<JobStatusCounts, ApplicationError> {
        let jobs = self.list(actor, None).await?;
        Ok(JobStatusCounts::tally(&jobs))
    }

    async fn load(&self, id: &JobId) -> Result<Job, ApplicationError> {
        self.jobs
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("job {id}")))
    }

    async fn modify(
        &self,
        id: &JobId,
        apply: impl FnOnce(&mut Job) -> Result<(), DomainError>,
    ) -> Result<Job, ApplicationError> {
        let mut job = self.load(id).await?;
        apply(&mut job)?;
        self.jobs.save(&job).await?;
        self.context.hub.jobs.publish(ChangeEvent::Updated(job.clone()));
        Ok(job)
    }

    fn attempt<'a>(
        &self,
        audit: &'a AuditContext,
        event_type: &'static str,
        id: &JobId,
        failure_message: &'static str,
    ) -> Attempt<'a> {
        Attempt {
            audit,
            event_type,
            category: AuditCategory::Job,
            subject_id: Some(id.to_string()),
            failure_message,
        }
    }
}
