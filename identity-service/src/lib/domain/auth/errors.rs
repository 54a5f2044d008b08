use auth::PasswordError;
use auth::PolicyViolation;
use auth::TokenError;
use thiserror::Error;

use crate::domain::email::errors::EmailSendError;
use crate::domain::email_validation::errors::EmailValidationError;
use crate::domain::session::errors::SessionError;
use crate::domain::user::errors::UserError;

/// Top-level error for the authentication flows.
///
/// Authorization failures are a single generic variant so that a caller
/// cannot tell which check failed; only the email-not-validated case is
/// distinguishable, and state conflicts are reported distinctly because
/// callers must branch on them.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email address has not been validated")]
    EmailNotValidated,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    PasswordPolicy(#[from] PolicyViolation),

    #[error("New password must differ from the current password")]
    PasswordReuse,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("Email address is already validated")]
    EmailAlreadyValidated,

    #[error("Validation token not found")]
    ValidationTokenNotFound,

    #[error("Validation token already used")]
    ValidationTokenUsed,

    #[error("Validation token expired")]
    ValidationTokenExpired,

    #[error("An active validation token already exists for this user")]
    ValidationTokenOutstanding,

    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<UserError> for AuthError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => AuthError::UserNotFound(id),
            UserError::EmailAlreadyExists(email) => AuthError::EmailAlreadyExists(email),
            UserError::EmailAlreadyValidated(_) => AuthError::EmailAlreadyValidated,
            UserError::DatabaseError(msg) => AuthError::Database(msg),
            other => AuthError::Unknown(other.to_string()),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::DatabaseError(msg) => AuthError::Database(msg),
            other => AuthError::Unknown(other.to_string()),
        }
    }
}

impl From<EmailValidationError> for AuthError {
    fn from(err: EmailValidationError) -> Self {
        match err {
            EmailValidationError::AlreadyUsed(_) => AuthError::ValidationTokenUsed,
            EmailValidationError::Expired(_) => AuthError::ValidationTokenExpired,
            EmailValidationError::NotFound => AuthError::ValidationTokenNotFound,
            EmailValidationError::DatabaseError(msg) => AuthError::Database(msg),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Unknown(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::Unknown(err.to_string())
    }
}

impl From<EmailSendError> for AuthError {
    fn from(err: EmailSendError) -> Self {
        AuthError::EmailDelivery(err.to_string())
    }
}
