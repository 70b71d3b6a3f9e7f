//! Handlers for acting on individual approval steps.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use excursions_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    /// `false` withdraws an earlier approval.
    pub checked: bool,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub skip: bool,
}

#[derive(Debug, Deserialize)]
pub struct NominateRequest {
    pub nominee: String,
}

/// POST /activities/{id}/steps/{step_id}/approve
pub async fn approve_step(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path((activity_id, step_id)): Path<(DbId, DbId)>,
    Json(body): Json<ApproveRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let outcome = state
        .activities
        .approve(&actor, activity_id, step_id, body.checked)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /activities/{id}/steps/{step_id}/skip
pub async fn skip_step(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path((activity_id, step_id)): Path<(DbId, DbId)>,
    Json(body): Json<SkipRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let outcome = state
        .activities
        .skip(&actor, activity_id, step_id, body.skip)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /activities/{id}/steps/{step_id}/nominate
pub async fn nominate_approver(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path((activity_id, step_id)): Path<(DbId, DbId)>,
    Json(body): Json<NominateRequest>,
) -> AppResult<impl IntoResponse> {
    let actor = auth.actor(&state.definition);
    let outcome = state
        .activities
        .nominate(&actor, activity_id, step_id, &body.nominee)
        .await?;

    tracing::info!(
        activity_id,
        step_id,
        nominee = %body.nominee,
        user = %auth.username,
        "Approver nominated",
    );

    Ok(Json(DataResponse { data: outcome }))
}
