use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::models::ChangePasswordCommand;
use crate::domain::auth::ports::AuthServicePort;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// The acting user comes from the access token, never from the body.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(authenticated): Extension<AuthenticatedUser>,
    Json(body): Json<ChangePasswordRequestBody>,
) -> Result<ApiSuccess<ChangePasswordResponseData>, ApiError> {
    state
        .auth_service
        .change_password(ChangePasswordCommand {
            user_id: authenticated.user_id,
            current_password: body.current_password,
            new_password: body.new_password,
        })
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ChangePasswordResponseData {
            message: "Password changed; please sign in again".to_string(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangePasswordRequestBody {
    current_password: String,
    new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangePasswordResponseData {
    pub message: String,
}
