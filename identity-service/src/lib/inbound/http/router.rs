use std::sync::Arc;
use std::time::Duration;

use auth::TokenIssuer;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::patch;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::change_password::change_password;
use super::handlers::create_user::create_user;
use super::handlers::force_password_change::force_password_change;
use super::handlers::login::login;
use super::handlers::refresh_token::refresh_token;
use super::handlers::reset_password::reset_password;
use super::handlers::reset_user_password::reset_user_password;
use super::handlers::send_validation_email::send_validation_email;
use super::handlers::update_profile::update_profile;
use super::handlers::validate_email::validate_email;
use super::middleware::authenticate as auth_middleware;
use crate::domain::auth::service::AuthService;
use crate::outbound::email::SmtpEmailSender;
use crate::outbound::repositories::email_validation::PostgresEmailValidationRepository;
use crate::outbound::repositories::session::PostgresSessionRepository;
use crate::outbound::repositories::user::PostgresUserRepository;

pub type HttpAuthService = AuthService<
    PostgresUserRepository,
    PostgresSessionRepository,
    PostgresEmailValidationRepository,
    SmtpEmailSender,
>;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<HttpAuthService>,
    pub token_issuer: Arc<TokenIssuer>,
}

pub fn create_router(auth_service: Arc<HttpAuthService>, token_issuer: Arc<TokenIssuer>) -> Router {
    let state = AppState {
        auth_service,
        token_issuer,
    };

    // No session exists yet in any of these flows.
    let public_routes = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh_token))
        .route("/api/auth/force-password-change", post(force_password_change))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/validate-email", post(validate_email))
        .route("/api/users", post(create_user));

    let protected_routes = Router::new()
        .route("/api/auth/change-password", post(change_password))
        .route("/api/users/:user_id/reset-password", post(reset_user_password))
        .route(
            "/api/users/:user_id/validation-email",
            post(send_validation_email),
        )
        .route("/api/users/:user_id", patch(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
