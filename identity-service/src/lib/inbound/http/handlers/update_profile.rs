use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::user::models::PersonName;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub is_email_validated: bool,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id().to_string(),
            email: user.email().as_str().to_string(),
            full_name: user.full_name(),
            is_email_validated: user.is_email_validated(),
        }
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<ApiSuccess<ProfileResponse>, ApiError> {
    let user_id =
        UserId::from_string(&id).map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    if !may_update(&caller, &user_id) {
        return Err(ApiError::Forbidden(
            "You may only update your own profile".to_string(),
        ));
    }

    let first_name =
        PersonName::new(req.first_name).map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;
    let last_name =
        PersonName::new(req.last_name).map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    state
        .auth_service
        .update_profile(user_id, first_name, last_name)
        .await
        .map_err(ApiError::from)
        .map(|user| ApiSuccess::new(StatusCode::OK, user.into()))
}

/// A caller may update a profile only when it is their own, unless they
/// are a company admin.
fn may_update(caller: &AuthenticatedUser, target: &UserId) -> bool {
    caller.user_id == *target || caller.is_admin
}
