use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;

pub async fn send_validation_email(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<ApiSuccess<SendValidationEmailResponseData>, ApiError> {
    let user_id =
        UserId::from_string(&user_id).map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    let outcome = state
        .auth_service
        .send_validation_email(user_id)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        SendValidationEmailResponseData {
            message: "Validation email sent".to_string(),
            expires_at: outcome.expires_at,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendValidationEmailResponseData {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}
