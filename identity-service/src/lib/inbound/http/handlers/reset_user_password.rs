use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::user::models::UserId;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// Admin-initiated reset. The acting admin comes from the access token;
/// the temporary password is returned so the admin can hand it over when
/// the user cannot receive email.
pub async fn reset_user_password(
    State(state): State<AppState>,
    Extension(authenticated): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> Result<ApiSuccess<ResetUserPasswordResponseData>, ApiError> {
    let target_user_id = UserId::from_string(&user_id)
        .map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    let outcome = state
        .auth_service
        .reset_user_password(target_user_id, authenticated.user_id)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ResetUserPasswordResponseData {
            email: outcome.email,
            full_name: outcome.full_name,
            temporary_password: outcome.temporary_password,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetUserPasswordResponseData {
    pub email: String,
    pub full_name: String,
    pub temporary_password: String,
}
