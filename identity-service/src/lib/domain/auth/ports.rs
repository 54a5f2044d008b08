use async_trait::async_trait;

use crate::domain::auth::errors::AuthError;
use crate::domain::auth::models::AdminPasswordResetOutcome;
use crate::domain::auth::models::ChangePasswordCommand;
use crate::domain::auth::models::EmailValidatedOutcome;
use crate::domain::auth::models::ForcePasswordChangeCommand;
use crate::domain::auth::models::IssuedTokens;
use crate::domain::auth::models::LoginCommand;
use crate::domain::auth::models::LoginOutcome;
use crate::domain::auth::models::PasswordResetOutcome;
use crate::domain::auth::models::RefreshCommand;
use crate::domain::auth::models::RefreshOutcome;
use crate::domain::auth::models::ValidationEmailOutcome;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::PersonName;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;

/// A newly registered user together with the temporary password the
/// person must exchange on first login.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: User,
    pub temporary_password: String,
}

/// Port for the authentication orchestrator.
///
/// Every flow is a short-lived request-scoped unit of work; the three
/// stores are mutated only through these operations.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Authenticate a user and open a fresh session.
    ///
    /// Prior sessions are deactivated before the new one is created.
    /// When a password change is mandatory, no session is created and no
    /// tokens are minted; the outcome carries the flag instead.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email, inactive account, or wrong password
    /// * `EmailNotValidated` - Account exists but the email is unproven
    async fn login(&self, command: LoginCommand) -> Result<LoginOutcome, AuthError>;

    /// Rotate the token pair of an existing session.
    ///
    /// Session identity is preserved across rotation; the old refresh
    /// token is invalid the moment the new pair is persisted.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown, inactive, or expired session; or inactive user
    async fn refresh_token(&self, command: RefreshCommand) -> Result<RefreshOutcome, AuthError>;

    /// Replace the password of an authenticated user and force
    /// re-authentication everywhere by deactivating all sessions.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown/inactive user or wrong current password
    /// * `PasswordPolicy` - New password violates the policy
    /// * `PasswordReuse` - New password equals the current one
    async fn change_password(&self, command: ChangePasswordCommand) -> Result<(), AuthError>;

    /// Exchange a temporary password for a user-chosen one and open a
    /// session in the same unit of work.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown user, no change required, or temporary password mismatch
    /// * `PasswordPolicy` - New password violates the policy
    async fn force_password_change(
        &self,
        command: ForcePasswordChangeCommand,
    ) -> Result<IssuedTokens, AuthError>;

    /// Self-service reset: issue a temporary password and deliver it by
    /// email (best effort).
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email (folded, to avoid account enumeration)
    async fn reset_password(&self, email: String) -> Result<PasswordResetOutcome, AuthError>;

    /// Admin-initiated reset of another user's password. Admin and
    /// target must share a company and the acting user must be a company
    /// admin; any ambiguity denies.
    ///
    /// # Errors
    /// * `Forbidden` - Acting user missing, not an admin, or company mismatch
    /// * `UserNotFound` - Target user does not exist
    async fn reset_user_password(
        &self,
        target_user_id: UserId,
        admin_user_id: UserId,
    ) -> Result<AdminPasswordResetOutcome, AuthError>;

    /// Issue a fresh email-ownership token and deliver it. Refused while
    /// an unused, unexpired token is outstanding; a failed delivery
    /// deletes the just-created token.
    ///
    /// # Errors
    /// * `UserNotFound` - User does not exist
    /// * `EmailAlreadyValidated` - Nothing to prove
    /// * `ValidationTokenOutstanding` - An active token already exists
    /// * `EmailDelivery` - Delivery failed (token compensated away)
    async fn send_validation_email(
        &self,
        user_id: UserId,
    ) -> Result<ValidationEmailOutcome, AuthError>;

    /// Consume an email-ownership token and mark the user's email
    /// validated as one unit.
    ///
    /// # Errors
    /// * `ValidationTokenNotFound` - No such token
    /// * `ValidationTokenUsed` - Token was consumed before
    /// * `ValidationTokenExpired` - Token lifetime elapsed
    /// * `EmailAlreadyValidated` - The user's email is already proven
    async fn validate_email(&self, token: String) -> Result<EmailValidatedOutcome, AuthError>;

    /// Register a new user with a generated temporary password and kick
    /// off email validation (best effort).
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Normalized email is already registered
    async fn create_user(&self, command: CreateUserCommand) -> Result<CreatedUser, AuthError>;

    /// Update a user's first/last name.
    ///
    /// # Errors
    /// * `UserNotFound` - User does not exist
    async fn update_profile(
        &self,
        user_id: UserId,
        first_name: PersonName,
        last_name: PersonName,
    ) -> Result<User, AuthError>;
}
