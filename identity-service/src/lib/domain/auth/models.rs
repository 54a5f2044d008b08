use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::models::CompanyId;
use crate::domain::user::models::UserId;

/// Credentials and client metadata presented at login.
#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Opaque refresh token and client metadata for token rotation.
#[derive(Debug, Clone)]
pub struct RefreshCommand {
    pub refresh_token: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordCommand {
    pub user_id: UserId,
    pub current_password: String,
    pub new_password: String,
}

/// Exchange of a temporary password for a user-chosen one. The only
/// flow that both changes credentials and opens a session.
#[derive(Debug, Clone)]
pub struct ForcePasswordChangeCommand {
    pub user_id: UserId,
    pub temporary_password: String,
    pub new_password: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// An access/refresh token pair with the access token's expiry.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a login attempt that passed credential verification.
///
/// `tokens` is `None` exactly when a mandatory password change blocks
/// session creation; no tokens are minted until the change completes.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: Option<IssuedTokens>,
    pub user_id: UserId,
    pub email: String,
    pub full_name: String,
    pub company_id: Option<CompanyId>,
    pub is_company_admin: bool,
    pub requires_password_change: bool,
    pub is_email_validated: bool,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub tokens: IssuedTokens,
    pub user_id: UserId,
    pub email: String,
    pub full_name: String,
    pub company_id: Option<CompanyId>,
    pub is_company_admin: bool,
}

/// Self-service password reset result.
#[derive(Debug, Clone)]
pub struct PasswordResetOutcome {
    pub temporary_password: String,
}

/// Admin-initiated password reset result.
#[derive(Debug, Clone)]
pub struct AdminPasswordResetOutcome {
    pub email: String,
    pub full_name: String,
    pub temporary_password: String,
}

#[derive(Debug, Clone)]
pub struct ValidationEmailOutcome {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EmailValidatedOutcome {
    pub user_id: UserId,
    pub email: String,
}
