use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::event;
use crate::state::AppState;

/// Calendar event routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(event::list_events).post(event::create_event))
        .route("/check-conflicts", get(event::check_conflicts))
        .route(
            "/{id}",
            get(event::get_event)
                .put(event::update_event)
                .delete(event::delete_event),
        )
        .route("/{id}/conflicts", get(event::list_conflicts))
        .route("/{id}/conflicts/sync", post(event::sync_conflicts))
        .route("/{id}/sync-approved", put(event::set_sync_approved))
}
