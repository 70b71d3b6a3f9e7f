//! Handlers for parent permissions and attendance.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use excursions_core::permission::PermissionResponse;
use excursions_core::types::DbId;
use excursions_db::models::permission::MentorPair;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireParent, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitialisePermissionsRequest {
    pub mentors: Vec<MentorPair>,
}

/// Body of a parent's answer; `1` is yes, `2` is no.
#[derive(Debug, Deserialize)]
pub struct PermissionResponseRequest {
    pub response: PermissionResponse,
}

/// POST /activities/{id}/permissions
pub async fn initialise_permissions(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(activity_id): Path<DbId>,
    Json(body): Json<InitialisePermissionsRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let permissions = state
        .permissions
        .initialise_permissions(&actor, activity_id, &body.mentors)
        .await?;
    Ok(Json(DataResponse { data: permissions }))
}

/// GET /activities/{id}/permissions
pub async fn list_permissions(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(activity_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let overview = state.permissions.list(&actor, activity_id).await?;
    Ok(Json(DataResponse { data: overview }))
}

/// PUT /activities/{id}/permissions/{student}
///
/// Records the calling parent's answer for one of their children.
pub async fn respond(
    RequireParent(auth): RequireParent,
    State(state): State<AppState>,
    Path((activity_id, student)): Path<(DbId, String)>,
    Json(body): Json<PermissionResponseRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let permission = state
        .permissions
        .record_response(&actor, activity_id, &student, body.response)
        .await?;
    Ok(Json(DataResponse { data: permission }))
}

/// GET /activities/{id}/attending
pub async fn list_attending(
    RequireStaff(_auth): RequireStaff,
    State(state): State<AppState>,
    Path(activity_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let students = state.permissions.get_all_attending(activity_id).await?;
    Ok(Json(DataResponse { data: students }))
}
