use std::collections::HashMap;

use tokio::sync::RwLock;

use workflow_core::domain::job::{Job, JobId, JobStatus};
use workflow_core::domain::payment::{PaymentRequest, PaymentRequestId, PaymentStatus};
use workflow_core::domain::resource::Resource;

use super::{JobRepository, PaymentRepository, RepositoryError, ResourceRepository};

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    requests: RwLock<HashMap<String, PaymentRequest>>,
}

#[async_trait::async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn find_by_id(
        &self,
        id: &PaymentRequestId,
    ) -> Result<Option<PaymentRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn insert(&self, request: &PaymentRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request.clone());
        Ok(())
    }

    async fn update_versioned(
        &self,
        request: &PaymentRequest,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        let stored = requests
            .get_mut(&request.id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment request {}", request.id)))?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                id: request.id.0.clone(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = request.clone();
        Ok(())
    }

    async fn list(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut listed: Vec<PaymentRequest> = requests
            .values()
            .filter(|request| status.map_or(true, |status| request.status == status))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(listed)
    }
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, Job>>,
}

#[async_trait::async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id.0).cloned())
    }

    async fn insert(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.0.clone(), job.clone());
        Ok(())
    }

    async fn save(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(&job.id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", job.id)))?;
        *stored = job.clone();
        Ok(())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, RepositoryError> {
        let jobs = self.jobs.read().await;
        let mut listed: Vec<Job> = jobs
            .values()
            .filter(|job| status.map_or(true, |status| job.status == status))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(listed)
    }
}

#[derive(Default)]
pub struct InMemoryResourceRepository {
    resources: RwLock<Vec<Resource>>,
}

#[async_trait::async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn insert(&self, resource: &Resource) -> Result<(), RepositoryError> {
        let mut resources = self.resources.write().await;
        resources.push(resource.clone());
        Ok(())
    }

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<Resource>, RepositoryError> {
        let resources = self.resources.read().await;
        Ok(resources
            .iter()
            .filter(|resource| resource.assigned_to.as_ref() == Some(job_id))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Resource>, RepositoryError> {
        Ok(self.resources.read().await.clone())
    }
}
