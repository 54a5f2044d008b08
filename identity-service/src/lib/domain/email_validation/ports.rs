use async_trait::async_trait;

use crate::domain::email_validation::errors::EmailValidationError;
use crate::domain::email_validation::models::EmailValidation;
use crate::domain::email_validation::models::EmailValidationId;
use crate::domain::user::models::UserId;

/// Persistence operations for email-ownership tokens.
///
/// Expired rows are swept by an external cleanup job; the flows only
/// need the operations below.
#[async_trait]
pub trait EmailValidationRepository: Send + Sync + 'static {
    /// Persist a new validation token.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn create(&self, validation: EmailValidation)
        -> Result<EmailValidation, EmailValidationError>;

    /// Retrieve a validation token by its opaque token string.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<EmailValidation>, EmailValidationError>;

    /// Persist the current state of an existing validation token.
    ///
    /// # Errors
    /// * `NotFound` - Token does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update(&self, validation: EmailValidation)
        -> Result<EmailValidation, EmailValidationError>;

    /// Delete a validation token; compensating action when delivery of
    /// the e-mail carrying it fails.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn delete(&self, id: &EmailValidationId) -> Result<(), EmailValidationError>;

    /// Whether an unused, unexpired token exists for the user.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn has_active_token_for_user(&self, user_id: &UserId)
        -> Result<bool, EmailValidationError>;
}
