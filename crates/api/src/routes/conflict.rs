use axum::routing::put;
use axum::Router;

use crate::handlers::conflict;
use crate::state::AppState;

/// Conflict routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/status", put(conflict::set_conflict_status))
}
