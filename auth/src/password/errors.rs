use thiserror::Error;

/// Error type for password hashing operations.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

/// First failing password-policy rule, with a user-correctable reason.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Password too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one digit")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecial,

    #[error("Password does not match the required pattern")]
    PatternMismatch,
}
