use std::sync::Arc;

use chrono::Utc;

use workflow_core::audit::{AuditCategory, AuditContext};
use workflow_core::domain::job::JobId;
use workflow_core::domain::resource::Resource;
use workflow_core::errors::{ApplicationError, DomainError};
use workflow_core::forms::{VehicleAssignmentForm, JOB_REQUIRED};
use workflow_core::identity::{Actor, Capability};
use workflow_core::live::ChangeEvent;
use workflow_core::notify::Notification;
use workflow_db::repositories::{JobRepository, ResourceRepository};

use crate::context::{Attempt, AuditSubject, Outcome, ServiceContext};

pub const ASSIGNED: &str = "Resources assigned successfully";
pub const ASSIGN_FAILED: &str = "Failed to assign resources";

impl AuditSubject for Resource {
    fn subject_id(&self) -> String {
        self.id.0.clone()
    }
}

pub struct ResourceService {
    resources: Arc<dyn ResourceRepository>,
    jobs: Arc<dyn JobRepository>,
    context: ServiceContext,
}

impl ResourceService {
    pub fn new(
        resources: Arc<dyn ResourceRepository>,
        jobs: Arc<dyn JobRepository>,
        context: ServiceContext,
    ) -> Self {
        Self { resources, jobs, context }
    }

    /// Records one vehicle against the job. Jobs may hold any number of vehicles.
    pub async fn assign_vehicle(
        &self,
        actor: &Actor,
        audit: &AuditContext,
        job_id: Option<&JobId>,
        form: &mut VehicleAssignmentForm,
    ) -> Outcome<Resource> {
        let result = self.try_assign_vehicle(actor, job_id, form).await;
        if result.is_ok() {
            form.reset();
        }

        self.context.conclude(
            Attempt {
                audit,
                event_type: "resource.assign_vehicle",
                category: AuditCategory::Resource,
                subject_id: job_id.map(ToString::to_string),
                failure_message: ASSIGN_FAILED,
            },
            result,
            |_| Notification::success(ASSIGNED),
        )
    }

    async fn try_assign_vehicle(
        &self,
        actor: &Actor,
        job_id: Option<&JobId>,
        form: &VehicleAssignmentForm,
    ) -> Result<Resource, ApplicationError> {
        actor.authorize(Capability::AssignResource)?;
        let job_id = job_id.ok_or_else(|| DomainError::Validation(JOB_REQUIRED.to_string()))?;
        form.validate()?;
        if self.jobs.find_by_id(job_id).await?.is_none() {
            return Err(ApplicationError::NotFound(format!("job {job_id}")));
        }

        let resource = Resource::vehicle_assignment(job_id.clone(), form, Utc::now());
        self.resources.insert(&resource).await?;
        self.context.hub.resources.publish(ChangeEvent::Inserted(resource.clone()));
        Ok(resource)
    }

    pub async fn list_for_job(
        &self,
        actor: &Actor,
        job_id: &JobId,
    ) -> Result<Vec<Resource>, ApplicationError> {
        actor.authorize(Capability::ViewJobs)?;
        Ok(self.resources.list_for_job(job_id).await?)
    }
}
