use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::SessionId;
use crate::domain::session::models::UserSession;
use crate::domain::session::ports::SessionRepository;
use crate::domain::user::models::UserId;

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    access_token: String,
    refresh_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    is_active: bool,
    user_agent: Option<String>,
    ip_address: Option<String>,
}

impl From<SessionRow> for UserSession {
    fn from(row: SessionRow) -> Self {
        UserSession::from_storage(
            SessionId(row.id),
            UserId(row.user_id),
            row.access_token,
            row.refresh_token,
            row.created_at,
            row.expires_at,
            row.last_used_at,
            row.is_active,
            row.user_agent,
            row.ip_address,
        )
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create(&self, session: UserSession) -> Result<UserSession, SessionError> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (
                id, user_id, access_token, refresh_token,
                created_at, expires_at, last_used_at, is_active, user_agent, ip_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id().0)
        .bind(session.user_id().0)
        .bind(session.access_token())
        .bind(session.refresh_token())
        .bind(session.created_at())
        .bind(session.expires_at())
        .bind(session.last_used_at())
        .bind(session.is_active())
        .bind(session.user_agent())
        .bind(session.ip_address())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

        Ok(session)
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserSession>, SessionError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, access_token, refresh_token,
                   created_at, expires_at, last_used_at, is_active, user_agent, ip_address
            FROM user_sessions
            WHERE refresh_token = $1
            "#,
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

        Ok(row.map(UserSession::from))
    }

    async fn update(&self, session: UserSession) -> Result<UserSession, SessionError> {
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET access_token = $2, refresh_token = $3, expires_at = $4,
                last_used_at = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(session.id().0)
        .bind(session.access_token())
        .bind(session.refresh_token())
        .bind(session.expires_at())
        .bind(session.last_used_at())
        .bind(session.is_active())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SessionError::NotFound(session.id().to_string()));
        }

        Ok(session)
    }

    async fn deactivate_all_for_user(&self, user_id: &UserId) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            UPDATE user_sessions
            SET is_active = FALSE
            WHERE user_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
