//! `GET /health`, unauthenticated, for load balancers and the ops board.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use excursions_db::repositories::OutboxRepo;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when Postgres is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Notifications queued but not yet delivered. `None` when the
    /// database could not be asked.
    pub pending_notifications: Option<i64>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = excursions_db::health_check(&state.pool).await.is_ok();
    let pending_notifications = if db_healthy {
        OutboxRepo::count_pending(&state.pool)
            .await
            .map_err(|e| tracing::warn!(error = %e, "Outbox backlog query failed"))
            .ok()
    } else {
        None
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        pending_notifications,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
