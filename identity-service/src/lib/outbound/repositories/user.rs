use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::user::errors::UserError;
use crate::domain::user::models::CompanyId;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::PersonName;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserRepository;

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    is_active: bool,
    is_email_validated: bool,
    must_change_password: bool,
    temporary_password: Option<String>,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
    email_validated_at: Option<DateTime<Utc>>,
    company_id: Option<Uuid>,
    is_company_admin: bool,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, UserError> {
        Ok(User::from_storage(
            UserId(self.id),
            PersonName::new(self.first_name)?,
            PersonName::new(self.last_name)?,
            EmailAddress::new(self.email)?,
            self.password_hash,
            self.is_active,
            self.is_email_validated,
            self.must_change_password,
            self.temporary_password,
            self.created_at,
            self.last_login_at,
            self.email_validated_at,
            self.company_id.map(CompanyId),
            self.is_company_admin,
        ))
    }
}

const USER_COLUMNS: &str = r#"
    id, first_name, last_name, email, password_hash,
    is_active, is_email_validated, must_change_password, temporary_password,
    created_at, last_login_at, email_validated_at, company_id, is_company_admin
"#;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, first_name, last_name, email, password_hash,
                is_active, is_email_validated, must_change_password, temporary_password,
                created_at, last_login_at, email_validated_at, company_id, is_company_admin
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(user.id().0)
        .bind(user.first_name().as_str())
        .bind(user.last_name().as_str())
        .bind(user.email().as_str())
        .bind(user.password_hash())
        .bind(user.is_active())
        .bind(user.is_email_validated())
        .bind(user.must_change_password())
        .bind(user.temporary_password())
        .bind(user.created_at())
        .bind(user.last_login_at())
        .bind(user.email_validated_at())
        .bind(user.company_id().map(|c| c.0))
        .bind(user.is_company_admin())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
                    return UserError::EmailAlreadyExists(user.email().as_str().to_string());
                }
            }
            UserError::DatabaseError(e.to_string())
        })?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn update(&self, user: User) -> Result<User, UserError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, password_hash = $5,
                is_active = $6, is_email_validated = $7, must_change_password = $8,
                temporary_password = $9, last_login_at = $10, email_validated_at = $11,
                company_id = $12, is_company_admin = $13
            WHERE id = $1
            "#,
        )
        .bind(user.id().0)
        .bind(user.first_name().as_str())
        .bind(user.last_name().as_str())
        .bind(user.email().as_str())
        .bind(user.password_hash())
        .bind(user.is_active())
        .bind(user.is_email_validated())
        .bind(user.must_change_password())
        .bind(user.temporary_password())
        .bind(user.last_login_at())
        .bind(user.email_validated_at())
        .bind(user.company_id().map(|c| c.0))
        .bind(user.is_company_admin())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
                    return UserError::EmailAlreadyExists(user.email().as_str().to_string());
                }
            }
            UserError::DatabaseError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(user.id().to_string()));
        }

        Ok(user)
    }
}
