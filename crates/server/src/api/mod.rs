//! JSON API.
//!
//! - `POST   /api/v1/sessions`                  sign in, returns a bearer token
//! - `DELETE /api/v1/sessions`                  sign out
//! - `PUT    /api/v1/sessions/role`             switch to the account holding a role
//! - `GET    /api/v1/jobs` / `POST /api/v1/jobs`
//! - `GET    /api/v1/jobs/summary`              counts per job status
//! - `GET    /api/v1/jobs/{id}` / `PATCH /api/v1/jobs/{id}`
//! - `PUT    /api/v1/jobs/{id}/status`
//! - `PUT    /api/v1/jobs/{id}/assignee`
//! - `GET    /api/v1/jobs/{id}/resources` / `POST /api/v1/jobs/{id}/resources`
//! - `GET    /api/v1/payments` / `POST /api/v1/payments`
//! - `GET    /api/v1/payments/summary`
//! - `POST   /api/v1/payments/{id}/approve`
//! - `POST   /api/v1/payments/{id}/reject`
//! - `GET    /api/v1/dashboard/payments`
//!
//! Every mutating response carries exactly one `notification`.

pub mod jobs;
pub mod payments;
pub mod sessions;

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use workflow_core::audit::{AuditContext, AuditSink};
use workflow_core::errors::{ApplicationError, InterfaceError};
use workflow_core::identity::Actor;
use workflow_core::notify::Notification;
use workflow_core::session::{SessionError, SessionManager};
use workflow_services::{JobService, Outcome, PaymentService, ResourceService};

use crate::dashboard::DashboardHandle;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub audit: Arc<dyn AuditSink>,
    pub payments: Arc<PaymentService>,
    pub jobs: Arc<JobService>,
    pub resources: Arc<ResourceService>,
    pub dashboard: DashboardHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/sessions",
            post(sessions::login).delete(sessions::logout),
        )
        .route("/api/v1/sessions/role", put(sessions::switch_role))
        .route("/api/v1/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/api/v1/jobs/summary", get(jobs::job_summary))
        .route("/api/v1/jobs/{id}", get(jobs::get_job).patch(jobs::update_job))
        .route("/api/v1/jobs/{id}/status", put(jobs::update_job_status))
        .route("/api/v1/jobs/{id}/assignee", put(jobs::assign_job))
        .route(
            "/api/v1/jobs/{id}/resources",
            get(jobs::list_resources).post(jobs::assign_vehicle),
        )
        .route("/api/v1/payments", get(payments::list_payments).post(payments::submit_payment))
        .route("/api/v1/payments/summary", get(payments::payment_summary))
        .route("/api/v1/payments/{id}/approve", post(payments::approve_payment))
        .route("/api/v1/payments/{id}/reject", post(payments::reject_payment))
        .route("/api/v1/dashboard/payments", get(payments::payment_dashboard))
        .with_state(state)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MutationBody<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated { correlation_id: String },
    Interface(InterfaceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Interface(error) => interface_status(error),
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Unauthenticated { correlation_id } => ErrorBody {
                code: "unauthenticated",
                message: "Please sign in to continue.".to_string(),
                detail: "missing or expired session token".to_string(),
                correlation_id: correlation_id.clone(),
            },
            Self::Interface(error) => error_body(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

pub(crate) fn interface_status(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(error: &InterfaceError) -> ErrorBody {
    let code = match error {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::Forbidden { .. } => "forbidden",
        InterfaceError::NotFound { .. } => "not_found",
        InterfaceError::Conflict { .. } => "conflict",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    };
    ErrorBody {
        code,
        message: error.user_message().to_string(),
        detail: error.message().to_string(),
        correlation_id: error.correlation_id().to_string(),
    }
}

/// Per-request identity: the resolved actor plus a fresh correlation id.
pub struct RequestContext {
    pub actor: Actor,
    pub token: String,
    pub audit: AuditContext,
}

impl RequestContext {
    pub fn correlation_id(&self) -> &str {
        &self.audit.correlation_id
    }

    pub fn fail(&self, error: ApplicationError) -> ApiError {
        ApiError::Interface(error.into_interface(self.correlation_id()))
    }
}

pub(crate) fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Runs a session call on the blocking pool. The file-backed store does synchronous I/O.
pub(crate) async fn with_sessions<R, F>(state: &AppState, apply: F) -> Result<R, SessionError>
where
    F: FnOnce(&SessionManager) -> Result<R, SessionError> + Send + 'static,
    R: Send + 'static,
{
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || apply(&sessions))
        .await
        .map_err(|error| SessionError::Storage(format!("session task failed: {error}")))?
}

pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<RequestContext, ApiError> {
    let correlation_id = new_correlation_id();
    let Some(token) = bearer_token(headers).map(str::to_string) else {
        return Err(ApiError::Unauthenticated { correlation_id });
    };
    let lookup = token.clone();
    let actor = match with_sessions(state, move |sessions| sessions.resolve(&lookup)).await {
        Ok(Some(actor)) => actor,
        Ok(None) => return Err(ApiError::Unauthenticated { correlation_id }),
        Err(error) => return Err(session_failure(error, correlation_id)),
    };

    let audit = AuditContext::new(correlation_id, actor.id.to_string());
    Ok(RequestContext { actor, token, audit })
}

pub(crate) fn session_failure(error: SessionError, correlation_id: String) -> ApiError {
    match error {
        SessionError::InvalidCredentials | SessionError::UnknownSession => {
            ApiError::Unauthenticated { correlation_id }
        }
        SessionError::NoAccountForRole(_) => ApiError::Interface(InterfaceError::BadRequest {
            message: error.to_string(),
            correlation_id,
        }),
        SessionError::Storage(_) | SessionError::Corrupt { .. } => {
            tracing::error!(
                event_name = "session.store_failed",
                correlation_id = %correlation_id,
                error = %error,
                "session store failure"
            );
            ApiError::Interface(InterfaceError::ServiceUnavailable {
                message: error.to_string(),
                correlation_id,
            })
        }
    }
}

/// Renders a mutation outcome: `success` status with data, or the mapped error status.
pub(crate) fn respond<T: Serialize>(
    outcome: Outcome<T>,
    correlation_id: &str,
    success: StatusCode,
) -> Response {
    let Outcome { result, notification } = outcome;
    match result {
        Ok(data) => {
            (success, Json(MutationBody { data: Some(data), notification, error: None }))
                .into_response()
        }
        Err(error) => {
            let error = error.into_interface(correlation_id);
            let body =
                MutationBody::<T> { data: None, notification, error: Some(error_body(&error)) };
            (interface_status(&error), Json(body)).into_response()
        }
    }
}
