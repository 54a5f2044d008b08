use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;
use std::net::SocketAddr;

use super::login::TokensData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::models::ForcePasswordChangeCommand;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;

/// Public route: the caller holds a temporary password, not a session.
pub async fn force_password_change(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<ForcePasswordChangeRequestBody>,
) -> Result<ApiSuccess<ForcePasswordChangeResponseData>, ApiError> {
    let user_id = UserId::from_string(&body.user_id)
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let tokens = state
        .auth_service
        .force_password_change(ForcePasswordChangeCommand {
            user_id,
            temporary_password: body.temporary_password,
            new_password: body.new_password,
            user_agent,
            ip_address: Some(addr.ip().to_string()),
        })
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ForcePasswordChangeResponseData {
            tokens: TokensData::from(&tokens),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForcePasswordChangeRequestBody {
    user_id: String,
    temporary_password: String,
    new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForcePasswordChangeResponseData {
    pub tokens: TokensData,
}
