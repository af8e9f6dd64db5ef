use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use workflow_db::{ChangeHub, DbPool};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    hub: ChangeHub,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub change_feeds: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, hub: ChangeHub) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, hub })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "workflow-server runtime initialized".to_string(),
        },
        database,
        change_feeds: feed_check(&state.hub),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

// Informational only; zero subscribers does not degrade readiness.
fn feed_check(hub: &ChangeHub) -> HealthCheck {
    HealthCheck {
        status: "ready",
        detail: format!(
            "subscribers: {}={}, {}={}, {}={}",
            hub.payments.table(),
            hub.payments.subscriber_count(),
            hub.jobs.table(),
            hub.jobs.subscriber_count(),
            hub.resources.table(),
            hub.resources.subscriber_count(),
        ),
    }
}
