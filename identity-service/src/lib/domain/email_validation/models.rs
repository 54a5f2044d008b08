use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::email_validation::errors::EmailValidationError;
use crate::domain::user::models::UserId;

/// Default lifetime of an email-ownership token.
const DEFAULT_EXPIRATION_HOURS: i64 = 24;

/// Email-validation token unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmailValidationId(pub Uuid);

impl EmailValidationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EmailValidationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EmailValidationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Single-use, time-boxed proof that the holder controls the registered
/// email address.
#[derive(Debug, Clone)]
pub struct EmailValidation {
    id: EmailValidationId,
    user_id: UserId,
    token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_used: bool,
    used_at: Option<DateTime<Utc>>,
}

impl EmailValidation {
    /// Create a token that expires 24 hours from now.
    pub fn with_default_expiration(user_id: UserId, token: String) -> Self {
        let now = Utc::now();
        Self {
            id: EmailValidationId::new(),
            user_id,
            token,
            created_at: now,
            expires_at: now + Duration::hours(DEFAULT_EXPIRATION_HOURS),
            is_used: false,
            used_at: None,
        }
    }

    /// Rehydrate a token from persisted state. Only the repository layer
    /// should call this.
    pub fn from_storage(
        id: EmailValidationId,
        user_id: UserId,
        token: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        is_used: bool,
        used_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            token,
            created_at,
            expires_at,
            is_used,
            used_at,
        }
    }

    pub fn id(&self) -> EmailValidationId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Unused and unexpired.
    pub fn is_valid(&self) -> bool {
        !self.is_used && !self.is_expired()
    }

    /// Consume the token. Checks used-then-expired, in that order.
    ///
    /// # Errors
    /// * `AlreadyUsed` - The token was consumed before
    /// * `Expired` - The token's lifetime has elapsed
    pub fn mark_used(&mut self) -> Result<(), EmailValidationError> {
        if self.is_used {
            return Err(EmailValidationError::AlreadyUsed(self.id.to_string()));
        }
        if self.is_expired() {
            return Err(EmailValidationError::Expired(self.id.to_string()));
        }
        self.is_used = true;
        self.used_at = Some(Utc::now());
        Ok(())
    }
}
