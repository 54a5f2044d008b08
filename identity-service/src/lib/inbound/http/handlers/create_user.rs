use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::auth::ports::CreatedUser;
use crate::domain::user::errors::EmailError;
use crate::domain::user::errors::PersonNameError;
use crate::domain::user::errors::UserIdError;
use crate::domain::user::models::CompanyId;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::PersonName;
use crate::inbound::http::router::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<ApiSuccess<CreateUserResponseData>, ApiError> {
    state
        .auth_service
        .create_user(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref created| ApiSuccess::new(StatusCode::CREATED, created.into()))
}

/// HTTP request body for creating a user (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateUserRequest {
    first_name: String,
    last_name: String,
    email: String,
    company_id: Option<String>,
    #[serde(default)]
    is_company_admin: bool,
}

#[derive(Debug, Clone, Error)]
enum ParseCreateUserRequestError {
    #[error("Invalid name: {0}")]
    Name(#[from] PersonNameError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Invalid company id: {0}")]
    CompanyId(#[from] UserIdError),
}

impl CreateUserRequest {
    fn try_into_command(self) -> Result<CreateUserCommand, ParseCreateUserRequestError> {
        let first_name = PersonName::new(self.first_name)?;
        let last_name = PersonName::new(self.last_name)?;
        let email = EmailAddress::new(self.email)?;
        let company_id = self
            .company_id
            .map(|id| CompanyId::from_string(&id))
            .transpose()?;

        Ok(CreateUserCommand {
            first_name,
            last_name,
            email,
            company_id,
            is_company_admin: self.is_company_admin,
        })
    }
}

impl From<ParseCreateUserRequestError> for ApiError {
    fn from(err: ParseCreateUserRequestError) -> Self {
        ApiError::UnprocessableEntity(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateUserResponseData {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub temporary_password: String,
    pub created_at: DateTime<Utc>,
}

impl From<&CreatedUser> for CreateUserResponseData {
    fn from(created: &CreatedUser) -> Self {
        Self {
            id: created.user.id().to_string(),
            email: created.user.email().as_str().to_string(),
            full_name: created.user.full_name(),
            temporary_password: created.temporary_password.clone(),
            created_at: created.user.created_at(),
        }
    }
}
