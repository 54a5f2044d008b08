use std::net::SocketAddr;
use std::sync::Arc;

use auth::TokenIssuer;
use chrono::Duration;
use identity_service::config::Config;
use identity_service::domain::auth::service::AuthService;
use identity_service::inbound::http::router::create_router;
use identity_service::outbound::email::SmtpEmailSender;
use identity_service::outbound::repositories::email_validation::PostgresEmailValidationRepository;
use identity_service::outbound::repositories::session::PostgresSessionRepository;
use identity_service::outbound::repositories::user::PostgresUserRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        jwt_issuer = %config.jwt.issuer,
        smtp_host = %config.smtp.host,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = 5,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let token_issuer = Arc::new(TokenIssuer::new(&config.jwt.token_config()));
    let user_repository = Arc::new(PostgresUserRepository::new(pg_pool.clone()));
    let session_repository = Arc::new(PostgresSessionRepository::new(pg_pool.clone()));
    let validation_repository = Arc::new(PostgresEmailValidationRepository::new(pg_pool));
    let email_sender = Arc::new(SmtpEmailSender::new(&config.smtp)?);

    let auth_service = Arc::new(AuthService::new(
        user_repository,
        session_repository,
        validation_repository,
        email_sender,
        Arc::clone(&token_issuer),
        config.password_policy.clone(),
        Duration::days(config.jwt.session_lifetime_days),
    ));

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(auth_service, token_issuer);
    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
