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
use crate::domain::auth::models::RefreshCommand;
use crate::domain::auth::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

pub async fn refresh_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequestBody>,
) -> Result<ApiSuccess<RefreshResponseData>, ApiError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let outcome = state
        .auth_service
        .refresh_token(RefreshCommand {
            refresh_token: body.refresh_token,
            user_agent,
            ip_address: Some(addr.ip().to_string()),
        })
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        RefreshResponseData {
            tokens: TokensData::from(&outcome.tokens),
            user_id: outcome.user_id.to_string(),
            email: outcome.email,
            full_name: outcome.full_name,
            company_id: outcome.company_id.map(|c| c.to_string()),
            is_company_admin: outcome.is_company_admin,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshRequestBody {
    refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResponseData {
    pub tokens: TokensData,
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub is_company_admin: bool,
}
