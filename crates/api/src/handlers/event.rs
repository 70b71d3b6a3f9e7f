//! Handlers for calendar events and their conflicts.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use excursions_core::types::{DbId, Timestamp};
use excursions_db::models::event::CreateEvent;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Query parameters
   -------------------------------------------------------------------------- */

/// Window for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventRangeParams {
    pub from: Timestamp,
    pub to: Timestamp,
}

/// Proposed window for `GET /events/check-conflicts`.
#[derive(Debug, Deserialize)]
pub struct CheckConflictsParams {
    /// The event being edited, excluded from its own results.
    pub event_id: Option<DbId>,
    pub timestart: Timestamp,
    pub timeend: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct SyncApprovedRequest {
    pub approved: bool,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// POST /events
pub async fn create_event(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<CreateEvent>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.calendar.create_event(&actor, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /events?from=&to=
pub async fn list_events(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<EventRangeParams>,
) -> AppResult<impl IntoResponse> {
    let events = state.calendar.list_events(params.from, params.to).await?;
    Ok(Json(DataResponse { data: events }))
}

/// GET /events/{id}
pub async fn get_event(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = state.calendar.get_event(id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// PUT /events/{id}
pub async fn update_event(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CreateEvent>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.calendar.update_event(&actor, id, &input).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /events/{id}
pub async fn delete_event(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let actor = auth.actor(&state.definition);
    state.calendar.delete_event(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /events/check-conflicts?event_id=&timestart=&timeend=
///
/// Overlapping events for a proposed window. Nothing is recorded.
pub async fn check_conflicts(
    RequireStaff(_auth): RequireStaff,
    State(state): State<AppState>,
    Query(params): Query<CheckConflictsParams>,
) -> AppResult<impl IntoResponse> {
    let events = state
        .calendar
        .check_conflicts(params.event_id, params.timestart, params.timeend)
        .await?;
    Ok(Json(DataResponse { data: events }))
}

/// GET /events/{id}/conflicts
pub async fn list_conflicts(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let conflicts = state.calendar.list_conflicts(id).await?;
    Ok(Json(DataResponse { data: conflicts }))
}

/// POST /events/{id}/conflicts/sync
pub async fn sync_conflicts(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let conflicts = state.calendar.sync_conflicts(&actor, id).await?;
    Ok(Json(DataResponse { data: conflicts }))
}

/// PUT /events/{id}/sync-approved
pub async fn set_sync_approved(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<SyncApprovedRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let event = state
        .calendar
        .set_sync_approved(&actor, id, body.approved)
        .await?;
    Ok(Json(DataResponse { data: event }))
}
