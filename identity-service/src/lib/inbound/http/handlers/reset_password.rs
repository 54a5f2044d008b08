use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

/// Self-service reset. The temporary password travels by email only; the
/// HTTP response never carries it.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequestBody>,
) -> Result<ApiSuccess<ResetPasswordResponseData>, ApiError> {
    state
        .auth_service
        .reset_password(body.email)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ResetPasswordResponseData {
            message: "A temporary password has been sent to your email address".to_string(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetPasswordRequestBody {
    email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetPasswordResponseData {
    pub message: String,
}
