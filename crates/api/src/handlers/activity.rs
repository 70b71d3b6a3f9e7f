//! Handlers for activity editing, lifecycle, and dashboards.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use excursions_core::activity::ActivityInput;
use excursions_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /activities/{id}`.
#[derive(Debug, Deserialize)]
pub struct SaveActivityRequest {
    #[serde(flatten)]
    pub input: ActivityInput,
    /// Version the client last read; a mismatch fails with 409.
    pub expected_version: Option<i32>,
}

/// POST /activities
pub async fn create_activity(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<ActivityInput>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.activities.save(&actor, None, input, None).await?;

    tracing::info!(
        activity_id = detail.activity.id,
        user = %auth.username,
        "Activity created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// PUT /activities/{id}
pub async fn update_activity(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<SaveActivityRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state
        .activities
        .save(&actor, Some(id), body.input, body.expected_version)
        .await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /activities/autosave
pub async fn autosave_new(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<ActivityInput>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.activities.autosave(&actor, None, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// PUT /activities/{id}/autosave
pub async fn autosave_existing(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ActivityInput>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.activities.autosave(&actor, Some(id), input).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /activities/{id}/submit
pub async fn submit_activity(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.activities.submit(&actor, id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /activities/{id}/cancel
pub async fn cancel_activity(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let detail = state.activities.cancel(&actor, id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// DELETE /activities/{id}
pub async fn delete_activity(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let actor = auth.actor(&state.definition);
    state.activities.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /activities/{id}
///
/// Activity with its lists, approval steps, and the caller's edit rights.
pub async fn get_activity(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let view = state.activities.get(&actor, id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// GET /activities
///
/// Activities the caller created, leads, plans, or accompanies.
pub async fn list_my_activities(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let activities = state.activities.list_for_user(&actor).await?;
    Ok(Json(DataResponse { data: activities }))
}

/// GET /activities/pending-approval
pub async fn list_pending_approval(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let activities = state.activities.list_for_approver(&actor).await?;
    Ok(Json(DataResponse { data: activities }))
}
