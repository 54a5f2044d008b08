use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

pub async fn validate_email(
    State(state): State<AppState>,
    Json(body): Json<ValidateEmailRequestBody>,
) -> Result<ApiSuccess<ValidateEmailResponseData>, ApiError> {
    let outcome = state
        .auth_service
        .validate_email(body.token)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ValidateEmailResponseData {
            user_id: outcome.user_id.to_string(),
            email: outcome.email,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidateEmailRequestBody {
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateEmailResponseData {
    pub user_id: String,
    pub email: String,
}
