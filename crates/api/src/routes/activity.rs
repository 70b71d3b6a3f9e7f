use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{activity, approval, permission};
use crate::state::AppState;

/// Activity routes, including step actions and permissions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(activity::list_my_activities).post(activity::create_activity),
        )
        .route("/autosave", post(activity::autosave_new))
        .route("/pending-approval", get(activity::list_pending_approval))
        .route(
            "/{id}",
            get(activity::get_activity)
                .put(activity::update_activity)
                .delete(activity::delete_activity),
        )
        .route("/{id}/autosave", put(activity::autosave_existing))
        .route("/{id}/submit", post(activity::submit_activity))
        .route("/{id}/cancel", post(activity::cancel_activity))
        .route("/{id}/steps/{step_id}/approve", post(approval::approve_step))
        .route("/{id}/steps/{step_id}/skip", post(approval::skip_step))
        .route(
            "/{id}/steps/{step_id}/nominate",
            post(approval::nominate_approver),
        )
        .route(
            "/{id}/permissions",
            get(permission::list_permissions).post(permission::initialise_permissions),
        )
        .route("/{id}/permissions/{student}", put(permission::respond))
        .route("/{id}/attending", get(permission::list_attending))
}
