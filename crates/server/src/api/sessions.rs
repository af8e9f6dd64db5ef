use std::str::FromStr;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use workflow_core::audit::{AuditCategory, AuditContext, AuditOutcome};
use workflow_core::errors::InterfaceError;
use workflow_core::identity::Role;
use workflow_core::notify::Notification;
use workflow_core::session::{Session, SessionError};

use super::{
    authenticate, new_correlation_id, session_failure, with_sessions, ApiError, AppState,
    MutationBody,
};

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SwitchRoleRequest {
    pub role: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let correlation_id = new_correlation_id();
    let (email, password) = (request.email.clone(), request.password.clone());
    match with_sessions(&state, move |sessions| sessions.login(&email, &password)).await {
        Ok(session) => {
            info!(
                event_name = "session.login",
                correlation_id = %correlation_id,
                actor_id = %session.actor.id,
                role = %session.actor.role,
                "signed in"
            );
            state.audit.emit(
                AuditContext::new(correlation_id, session.actor.id.to_string())
                    .event(None, "session.login", AuditCategory::Session, AuditOutcome::Success)
                    .with_metadata("role", session.actor.role.as_str()),
            );
            let notification =
                Notification::success(format!("Signed in as {}", session.actor.name));
            Ok(created(session, notification))
        }
        Err(SessionError::InvalidCredentials) => {
            warn!(
                event_name = "session.login_rejected",
                correlation_id = %correlation_id,
                "unknown or inactive account"
            );
            state.audit.emit(
                AuditContext::new(correlation_id.clone(), "anonymous")
                    .event(None, "session.login", AuditCategory::Session, AuditOutcome::Rejected)
                    .with_metadata("email", request.email.trim()),
            );
            Err(ApiError::Unauthenticated { correlation_id })
        }
        Err(error) => Err(session_failure(error, correlation_id)),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let token = context.token.clone();
    with_sessions(&state, move |sessions| sessions.logout(&token))
        .await
        .map_err(|error| session_failure(error, context.correlation_id().to_string()))?;

    state.audit.emit(context.audit.event(
        None,
        "session.logout",
        AuditCategory::Session,
        AuditOutcome::Success,
    ));
    let body = MutationBody::<()> {
        data: None,
        notification: Notification::success("Signed out"),
        error: None,
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Re-points the session at the directory account holding the requested role.
pub async fn switch_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SwitchRoleRequest>,
) -> Result<Response, ApiError> {
    let context = authenticate(&state, &headers).await?;
    let role = Role::from_str(&request.role).map_err(|error| {
        ApiError::Interface(InterfaceError::BadRequest {
            message: error.to_string(),
            correlation_id: context.correlation_id().to_string(),
        })
    })?;

    let token = context.token.clone();
    let session = with_sessions(&state, move |sessions| sessions.switch_role(&token, role))
        .await
        .map_err(|error| session_failure(error, context.correlation_id().to_string()))?;

    state.audit.emit(
        context
            .audit
            .event(None, "session.switch_role", AuditCategory::Session, AuditOutcome::Success)
            .with_metadata("from", context.actor.role.as_str())
            .with_metadata("to", role.as_str()),
    );
    let notification = Notification::success(format!("Switched to {role}"));
    let body = MutationBody { data: Some(session), notification, error: None };
    Ok((StatusCode::OK, Json(body)).into_response())
}

fn created(session: Session, notification: Notification) -> Response {
    let body = MutationBody { data: Some(session), notification, error: None };
    (StatusCode::CREATED, Json(body)).into_response()
}
