use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};

use workflow_core::domain::job::JobId;
use workflow_core::domain::payment::{PaymentRequest, PaymentRequestId, PaymentStatus};
use workflow_core::errors::{ApplicationError, InterfaceError};
use workflow_core::forms::PaymentRequestForm;
use workflow_core::identity::Capability;
use workflow_core::live::{PaymentBoardSnapshot, PaymentStatusCounts};

use super::{authenticate, respond, ApiError, AppState};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitPayment {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub form: PaymentRequestForm,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApprovePayment {
    pub note: Option<String>,
    pub expected_version: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectPayment {
    #[serde(alias = "note")]
    pub reason: String,
    pub expected_version: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PaymentList {
    pub requests: Vec<PaymentRequest>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<PaymentList>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let status = match filter.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
        None => None,
        Some(raw) => Some(PaymentStatus::parse(raw).ok_or_else(|| {
            ApiError::Interface(InterfaceError::BadRequest {
                message: format!("unknown payment status `{raw}`"),
                correlation_id: context.correlation_id().to_string(),
            })
        })?),
    };

    let requests =
        state.payments.list(&context.actor, status).await.map_err(|e| context.fail(e))?;
    Ok(Json(PaymentList { requests }))
}

pub async fn payment_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PaymentStatusCounts>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let counts = state.payments.summary(&context.actor).await.map_err(|e| context.fail(e))?;
    Ok(Json(counts))
}

pub async fn submit_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitPayment>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let SubmitPayment { job_id, mut form } = body;
    let job_id = job_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()).map(JobId);

    let outcome = state.payments.submit(&context.actor, &context.audit, job_id, &mut form).await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::CREATED))
}

pub async fn approve_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ApprovePayment>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let outcome = state
        .payments
        .approve(
            &context.actor,
            &context.audit,
            &PaymentRequestId(id),
            body.note.as_deref(),
            body.expected_version,
        )
        .await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::OK))
}

pub async fn reject_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RejectPayment>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let outcome = state
        .payments
        .reject(
            &context.actor,
            &context.audit,
            &PaymentRequestId(id),
            &body.reason,
            body.expected_version,
        )
        .await;
    Ok(respond(outcome, context.correlation_id(), StatusCode::OK))
}

/// Served from the live board rather than a fresh query.
pub async fn payment_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PaymentBoardSnapshot>, ApiError> {
    let context = authenticate(&state, &headers).await?;
    context
        .actor
        .authorize(Capability::ViewPayments)
        .map_err(|error| context.fail(ApplicationError::from(error)))?;
    Ok(Json(state.dashboard.snapshot().await))
}
