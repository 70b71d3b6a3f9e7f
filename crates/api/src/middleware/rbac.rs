//! Role-based access control extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! match. Finer checks (ownership, approver rosters) live in the workflow
//! services.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use excursions_core::error::CoreError;

use super::auth::AuthUser;
use crate::auth::jwt::Role;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `staff` role. Rejects with 403 otherwise.
///
/// ```ignore
/// async fn staff_only(RequireStaff(user): RequireStaff) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Staff {
            return Err(AppError::Core(CoreError::PermissionDenied(
                "Staff role required".into(),
            )));
        }
        Ok(RequireStaff(user))
    }
}

/// Requires the `parent` role. Rejects with 403 otherwise.
pub struct RequireParent(pub AuthUser);

impl FromRequestParts<AppState> for RequireParent {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Parent {
            return Err(AppError::Core(CoreError::PermissionDenied(
                "Parent role required".into(),
            )));
        }
        Ok(RequireParent(user))
    }
}
