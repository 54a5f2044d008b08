use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;

use crate::domain::session::models::SessionId;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;

/// Extension type to store the authenticated caller in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub is_admin: bool,
}

/// Middleware that validates access tokens and adds caller info to
/// request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    // Signature, issuer, audience, and expiry (zero clock skew) all
    // checked inside the issuer.
    let claims = state
        .token_issuer
        .validate_access_token(token)
        .ok_or_else(|| {
            tracing::warn!("Access token validation failed");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid or expired token"
                })),
            )
                .into_response()
        })?;

    let user_id = UserId::from_string(&claims.sub).map_err(|e| {
        tracing::error!("Failed to parse user id from token: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid token format"
            })),
        )
            .into_response()
    })?;

    let session_id = SessionId::from_string(&claims.sid).map_err(|e| {
        tracing::error!("Failed to parse session id from token: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid token format"
            })),
        )
            .into_response()
    })?;

    req.extensions_mut().insert(AuthenticatedUser {
        user_id,
        session_id,
        is_admin: claims.is_admin,
    });

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing Authorization header"
                })),
            )
                .into_response()
        })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid Authorization header"
            })),
        )
            .into_response()
    })?;

    if !auth_str.starts_with("Bearer ") {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid Authorization header format. Expected: Bearer <token>"
            })),
        )
            .into_response());
    }

    Ok(auth_str.trim_start_matches("Bearer "))
}
