use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use excursions_core::conflict::ConflictStatus;
use excursions_core::types::DbId;
use excursions_db::models::conflict::UpdateConflictStatus;

use crate::error::AppResult;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

/// PUT /conflicts/{id}/status
///
/// `0` flags the conflict, `1` ignores it. Ignored conflicts stay ignored
/// across later re-checks while the events still overlap.
pub async fn set_conflict_status(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<UpdateConflictStatus>,
) -> AppResult<impl IntoResponse> {
    let status = ConflictStatus::from_i16(body.status)?;
    let actor = auth.actor(&state.definition);
    let conflict = state.calendar.set_conflict_status(&actor, id, status).await?;
    Ok(Json(DataResponse { data: conflict }))
}
