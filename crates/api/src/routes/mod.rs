pub mod activity;
pub mod conflict;
pub mod event;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /activities                                   list mine, create
/// /activities/autosave                          autosave new
/// /activities/pending-approval                  approver dashboard
/// /activities/{id}                              get, save, delete
/// /activities/{id}/autosave                     autosave existing
/// /activities/{id}/submit                       send for review
/// /activities/{id}/cancel                       cancel
/// /activities/{id}/steps/{step_id}/approve      approve / withdraw
/// /activities/{id}/steps/{step_id}/skip         skip / unskip
/// /activities/{id}/steps/{step_id}/nominate     nominate approver
/// /activities/{id}/permissions                  list, initialise
/// /activities/{id}/permissions/{student}        parent response
/// /activities/{id}/attending                    attending students
///
/// /events                                       list in range, create
/// /events/check-conflicts                       dry-run overlap check
/// /events/{id}                                  get, update, delete
/// /events/{id}/conflicts                        list
/// /events/{id}/conflicts/sync                   re-check and reconcile
/// /events/{id}/sync-approved                    approve for external sync
///
/// /conflicts/{id}/status                        flag / ignore
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/activities", activity::router())
        .nest("/events", event::router())
        .nest("/conflicts", conflict::router())
}
