use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::email_validation::errors::EmailValidationError;
use crate::domain::email_validation::models::EmailValidation;
use crate::domain::email_validation::models::EmailValidationId;
use crate::domain::email_validation::ports::EmailValidationRepository;
use crate::domain::user::models::UserId;

pub struct PostgresEmailValidationRepository {
    pool: PgPool,
}

impl PostgresEmailValidationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EmailValidationRow {
    id: Uuid,
    user_id: Uuid,
    token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_used: bool,
    used_at: Option<DateTime<Utc>>,
}

impl From<EmailValidationRow> for EmailValidation {
    fn from(row: EmailValidationRow) -> Self {
        EmailValidation::from_storage(
            EmailValidationId(row.id),
            UserId(row.user_id),
            row.token,
            row.created_at,
            row.expires_at,
            row.is_used,
            row.used_at,
        )
    }
}

#[async_trait]
impl EmailValidationRepository for PostgresEmailValidationRepository {
    async fn create(
        &self,
        validation: EmailValidation,
    ) -> Result<EmailValidation, EmailValidationError> {
        sqlx::query(
            r#"
            INSERT INTO email_validations (
                id, user_id, token, created_at, expires_at, is_used, used_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(validation.id().0)
        .bind(validation.user_id().0)
        .bind(validation.token())
        .bind(validation.created_at())
        .bind(validation.expires_at())
        .bind(validation.is_used())
        .bind(validation.used_at())
        .execute(&self.pool)
        .await
        .map_err(|e| EmailValidationError::DatabaseError(e.to_string()))?;

        Ok(validation)
    }

    async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<EmailValidation>, EmailValidationError> {
        let row = sqlx::query_as::<_, EmailValidationRow>(
            r#"
            SELECT id, user_id, token, created_at, expires_at, is_used, used_at
            FROM email_validations
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EmailValidationError::DatabaseError(e.to_string()))?;

        Ok(row.map(EmailValidation::from))
    }

    async fn update(
        &self,
        validation: EmailValidation,
    ) -> Result<EmailValidation, EmailValidationError> {
        let result = sqlx::query(
            r#"
            UPDATE email_validations
            SET is_used = $2, used_at = $3
            WHERE id = $1
            "#,
        )
        .bind(validation.id().0)
        .bind(validation.is_used())
        .bind(validation.used_at())
        .execute(&self.pool)
        .await
        .map_err(|e| EmailValidationError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(EmailValidationError::NotFound);
        }

        Ok(validation)
    }

    async fn delete(&self, id: &EmailValidationId) -> Result<(), EmailValidationError> {
        sqlx::query("DELETE FROM email_validations WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| EmailValidationError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn has_active_token_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<bool, EmailValidationError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM email_validations
            WHERE user_id = $1 AND is_used = FALSE AND expires_at > NOW()
            LIMIT 1
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EmailValidationError::DatabaseError(e.to_string()))?;

        Ok(row.is_some())
    }
}
