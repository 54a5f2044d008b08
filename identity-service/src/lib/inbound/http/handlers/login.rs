use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::net::SocketAddr;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::models::IssuedTokens;
use crate::domain::auth::models::LoginCommand;
use crate::domain::auth::ports::AuthServicePort;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginRequestBody>,
) -> Result<ApiSuccess<LoginResponseData>, ApiError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let outcome = state
        .auth_service
        .login(LoginCommand {
            email: body.email,
            password: body.password,
            user_agent,
            ip_address: Some(addr.ip().to_string()),
        })
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        LoginResponseData {
            tokens: outcome.tokens.as_ref().map(TokensData::from),
            user_id: outcome.user_id.to_string(),
            email: outcome.email,
            full_name: outcome.full_name,
            company_id: outcome.company_id.map(|c| c.to_string()),
            is_company_admin: outcome.is_company_admin,
            requires_password_change: outcome.requires_password_change,
            is_email_validated: outcome.is_email_validated,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    email: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokensData>,
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub is_company_admin: bool,
    pub requires_password_change: bool,
    pub is_email_validated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokensData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&IssuedTokens> for TokensData {
    fn from(tokens: &IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_carries_email_validation_flag() {
        let data = LoginResponseData {
            tokens: None,
            user_id: "6c2e2f6a-3b6e-4a2e-9a1d-0f8b2c9d4e51".to_string(),
            email: "ana@example.com".to_string(),
            full_name: "Ana Duarte".to_string(),
            company_id: None,
            is_company_admin: false,
            requires_password_change: true,
            is_email_validated: false,
        };

        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["is_email_validated"], serde_json::json!(false));
        assert_eq!(json["requires_password_change"], serde_json::json!(true));
        assert!(json.get("tokens").is_none());
    }
}
