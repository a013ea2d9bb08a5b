use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use reviewbot_db::DbPool;
use reviewbot_slack::WorkspaceRegistry;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    registry: Arc<WorkspaceRegistry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    /// Workspaces with a bot handle spawned since startup.
    pub active_workspaces: usize,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, registry: Arc<WorkspaceRegistry>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, registry })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        active_workspaces: state.registry.len().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team").fetch_one(pool).await {
        Ok(teams) => HealthCheck { status: "ready", detail: format!("{teams} team(s) stored") },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("team table unreadable: {error}") }
        }
    }
}
