use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};

use workflow_core::domain::job::{Job, JobId, JobPatch, JobStatus};
use workflow_core::domain::resource::Resource;
use workflow_core::errors::InterfaceError;
use workflow_core::forms::{JobForm, VehicleAssignmentForm};
use workflow_core::identity::ActorId;
use workflow_core::live::JobStatusCounts;

use super::{authenticate, respond, ApiError, AppState, RequestContext};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Assignee {
    pub worker_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobList {
    pub jobs: Vec<Job>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResourceList {
    pub job_id: JobId,
    pub resources: Vec<Resource>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<JobList>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let status = parse_status(&context, filter.status.as_deref())?;
    let jobs = state.jobs.list(&context.actor, status).await.map_err(|e| context.fail(e))?;
    Ok(Json(JobList { jobs }))
}

pub async fn job_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JobStatusCounts>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let counts = state.jobs.tally(&context.actor).await.map_err(|e| context.fail(e))?;
    Ok(Json(counts))
}

pub async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let job = state.jobs.get(&context.actor, &JobId(id)).await.map_err(|e| context.fail(e))?;
    Ok(Json(job))
}

pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut form): Json<JobForm>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let outcome = state.jobs.create(&context.actor, &context.audit, &mut form).await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::CREATED))
}

pub async fn update_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<JobPatch>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let outcome = state.jobs.update(&context.actor, &context.audit, &JobId(id), patch).await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::OK))
}

pub async fn update_job_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let Some(next) = parse_status(&context, Some(&change.status))? else {
        return Err(bad_request(&context, "status is required".to_string()));
    };
    let outcome =
        state.jobs.update_status(&context.actor, &context.audit, &JobId(id), next).await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::OK))
}

pub async fn assign_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(assignee): Json<Assignee>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let worker = ActorId(assignee.worker_id.trim().to_string());
    let outcome = state.jobs.assign(&context.actor, &context.audit, &JobId(id), &worker).await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::OK))
}

pub async fn list_resources(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ResourceList>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let job_id = JobId(id);
    let resources = state
        .resources
        .list_for_job(&context.actor, &job_id)
        .await
        .map_err(|e| context.fail(e))?;
    Ok(Json(ResourceList { job_id, resources }))
}

pub async fn assign_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut form): Json<VehicleAssignmentForm>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let job_id = JobId(id);
    let outcome = state
        .resources
        .assign_vehicle(&context.actor, &context.audit, Some(&job_id), &mut form)
        .await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::CREATED))
}

fn parse_status(
    context: &RequestContext,
    raw: Option<&str>,
) -> Result<Option<JobStatus>, ApiError> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    JobStatus::parse(raw)
        .map(Some)
        .ok_or_else(|| bad_request(context, format!("unknown job status `{raw}`")))
}

fn bad_request(context: &RequestContext, message: String) -> ApiError {
    ApiError::Interface(InterfaceError::BadRequest {
        message,
        correlation_id: context.correlation_id().to_string(),
    })
}
