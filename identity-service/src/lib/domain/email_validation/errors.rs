use thiserror::Error;

/// Error for email-validation token operations
#[derive(Debug, Clone, Error)]
pub enum EmailValidationError {
    #[error("Validation token already used: {0}")]
    AlreadyUsed(String),

    #[error("Validation token expired: {0}")]
    Expired(String),

    #[error("Validation token not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
