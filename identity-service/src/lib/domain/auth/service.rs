use std::sync::Arc;

use async_trait::async_trait;
use auth::random_token;
use auth::PasswordHasher;
use auth::PasswordPolicy;
use auth::TokenIdentity;
use auth::TokenIssuer;
use chrono::Duration;
use chrono::Utc;

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
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::auth::ports::CreatedUser;
use crate::domain::email::models::EmailMessage;
use crate::domain::email::ports::EmailSender;
use crate::domain::email_validation::models::EmailValidation;
use crate::domain::email_validation::ports::EmailValidationRepository;
use crate::domain::session::models::UserSession;
use crate::domain::session::ports::SessionRepository;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::PersonName;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserRepository;

/// Number of random bytes in an email-ownership token.
const VALIDATION_TOKEN_BYTES: usize = 32;

/// Authentication orchestrator.
///
/// Composes the credential, session, and email-ownership stores with the
/// hasher, policy engine, and token issuer into the authentication
/// flows. The stores are mutated only through this service.
pub struct AuthService<UR, SR, VR, ES>
where
    UR: UserRepository,
    SR: SessionRepository,
    VR: EmailValidationRepository,
    ES: EmailSender,
{
    users: Arc<UR>,
    sessions: Arc<SR>,
    validations: Arc<VR>,
    email_sender: Arc<ES>,
    token_issuer: Arc<TokenIssuer>,
    policy: PasswordPolicy,
    hasher: PasswordHasher,
    session_lifetime: Duration,
}

impl<UR, SR, VR, ES> AuthService<UR, SR, VR, ES>
where
    UR: UserRepository,
    SR: SessionRepository,
    VR: EmailValidationRepository,
    ES: EmailSender,
{
    pub fn new(
        users: Arc<UR>,
        sessions: Arc<SR>,
        validations: Arc<VR>,
        email_sender: Arc<ES>,
        token_issuer: Arc<TokenIssuer>,
        policy: PasswordPolicy,
        session_lifetime: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            validations,
            email_sender,
            token_issuer,
            policy,
            hasher: PasswordHasher::new(),
            session_lifetime,
        }
    }

    /// Deactivate every prior session, then open a fresh one.
    ///
    /// Two-phase: the record is persisted with an empty access token
    /// first, because the token's claims embed the session's own id.
    /// Strict ordering means a crash mid-way leaves the user with zero
    /// active sessions, never two.
    async fn open_session(
        &self,
        user: &User,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<IssuedTokens, AuthError> {
        self.sessions.deactivate_all_for_user(&user.id()).await?;

        let refresh_token = self.token_issuer.issue_refresh_token();
        let expires_at = Utc::now() + self.session_lifetime;
        let session = UserSession::new_for_login(
            user.id(),
            refresh_token.clone(),
            expires_at,
            user_agent,
            ip_address,
        );
        let mut session = self.sessions.create(session).await?;

        let issued = self.token_issuer.issue_access_token(&TokenIdentity {
            user_id: user.id().0,
            email: user.email().as_str().to_string(),
            company_id: user.company_id().map(|c| c.0),
            session_id: session.id().0,
            is_admin: user.is_company_admin(),
        })?;

        session.attach_access_token(issued.token.clone());
        self.sessions.update(session).await?;

        Ok(IssuedTokens {
            access_token: issued.token,
            refresh_token,
            expires_at: issued.expires_at,
        })
    }

    /// Persist a fresh ownership token and deliver it. A failed delivery
    /// deletes the token again: it must not outlive a failed send.
    async fn issue_and_send_validation(
        &self,
        user: &User,
    ) -> Result<ValidationEmailOutcome, AuthError> {
        let token = random_token(VALIDATION_TOKEN_BYTES);
        let validation = EmailValidation::with_default_expiration(user.id(), token.clone());
        let validation = self.validations.create(validation).await?;

        let message = validation_email(user, &token);
        if let Err(e) = self.email_sender.send(&message).await {
            tracing::error!(
                user_id = %user.id(),
                "Failed to deliver validation email, removing token: {}",
                e
            );
            if let Err(delete_err) = self.validations.delete(&validation.id()).await {
                tracing::error!(
                    user_id = %user.id(),
                    "Failed to remove validation token after delivery failure: {}",
                    delete_err
                );
            }
            return Err(AuthError::EmailDelivery(e.to_string()));
        }

        Ok(ValidationEmailOutcome {
            token,
            expires_at: validation.expires_at(),
        })
    }

    /// Install a fresh temporary password and cut every live session.
    async fn apply_temporary_password(&self, mut user: User) -> Result<String, AuthError> {
        let temporary_password = self.policy.generate_temporary_password();
        let password_hash = self.hasher.hash(&temporary_password)?;
        user.set_temporary_password(password_hash, temporary_password.clone());

        let user = self.users.update(user).await?;
        self.sessions.deactivate_all_for_user(&user.id()).await?;

        Ok(temporary_password)
    }
}

#[async_trait]
impl<UR, SR, VR, ES> AuthServicePort for AuthService<UR, SR, VR, ES>
where
    UR: UserRepository,
    SR: SessionRepository,
    VR: EmailValidationRepository,
    ES: EmailSender,
{
    async fn login(&self, command: LoginCommand) -> Result<LoginOutcome, AuthError> {
        let email =
            EmailAddress::new(command.email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active() {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_email_validated() {
            return Err(AuthError::EmailNotValidated);
        }
        if !self.hasher.verify(&command.password, user.password_hash()) {
            return Err(AuthError::InvalidCredentials);
        }

        if user.requires_password_change() {
            // Short-circuit: no session, no tokens, until the mandatory
            // change completes.
            return Ok(LoginOutcome {
                tokens: None,
                user_id: user.id(),
                email: user.email().as_str().to_string(),
                full_name: user.full_name(),
                company_id: user.company_id(),
                is_company_admin: user.is_company_admin(),
                requires_password_change: true,
                is_email_validated: user.is_email_validated(),
            });
        }

        let tokens = self
            .open_session(&user, command.user_agent, command.ip_address)
            .await?;

        let mut user = user;
        user.record_login();
        let user = self.users.update(user).await?;

        Ok(LoginOutcome {
            tokens: Some(tokens),
            user_id: user.id(),
            email: user.email().as_str().to_string(),
            full_name: user.full_name(),
            company_id: user.company_id(),
            is_company_admin: user.is_company_admin(),
            requires_password_change: false,
            is_email_validated: user.is_email_validated(),
        })
    }

    async fn refresh_token(&self, command: RefreshCommand) -> Result<RefreshOutcome, AuthError> {
        let session = self
            .sessions
            .find_by_refresh_token(&command.refresh_token)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !session.is_active() || session.is_expired() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .users
            .find_by_id(&session.user_id())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active() {
            return Err(AuthError::InvalidCredentials);
        }

        // Session identity is preserved: the new access token is minted
        // against the existing session id.
        let issued = self.token_issuer.issue_access_token(&TokenIdentity {
            user_id: user.id().0,
            email: user.email().as_str().to_string(),
            company_id: user.company_id().map(|c| c.0),
            session_id: session.id().0,
            is_admin: user.is_company_admin(),
        })?;
        let refresh_token = self.token_issuer.issue_refresh_token();
        let expires_at = Utc::now() + self.session_lifetime;

        let mut session = session;
        session.rotate_tokens(issued.token.clone(), refresh_token.clone(), expires_at);
        self.sessions.update(session).await?;

        Ok(RefreshOutcome {
            tokens: IssuedTokens {
                access_token: issued.token,
                refresh_token,
                expires_at: issued.expires_at,
            },
            user_id: user.id(),
            email: user.email().as_str().to_string(),
            full_name: user.full_name(),
            company_id: user.company_id(),
            is_company_admin: user.is_company_admin(),
        })
    }

    async fn change_password(&self, command: ChangePasswordCommand) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(&command.user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active() {
            return Err(AuthError::InvalidCredentials);
        }
        if !self
            .hasher
            .verify(&command.current_password, user.password_hash())
        {
            return Err(AuthError::InvalidCredentials);
        }

        self.policy.validate(&command.new_password)?;

        if self
            .hasher
            .verify(&command.new_password, user.password_hash())
        {
            return Err(AuthError::PasswordReuse);
        }

        let password_hash = self.hasher.hash(&command.new_password)?;
        let mut user = user;
        user.update_password(password_hash);
        let user = self.users.update(user).await?;

        // A password change forces re-authentication everywhere.
        self.sessions.deactivate_all_for_user(&user.id()).await?;

        Ok(())
    }

    async fn force_password_change(
        &self,
        command: ForcePasswordChangeCommand,
    ) -> Result<IssuedTokens, AuthError> {
        let user = self
            .users
            .find_by_id(&command.user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.requires_password_change() {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.has_valid_temporary_password(&command.temporary_password) {
            return Err(AuthError::InvalidCredentials);
        }

        self.policy.validate(&command.new_password)?;

        let password_hash = self.hasher.hash(&command.new_password)?;
        let mut user = user;
        user.update_password(password_hash);
        user.clear_temporary_password();
        let user = self.users.update(user).await?;

        let tokens = self
            .open_session(&user, command.user_agent, command.ip_address)
            .await?;

        // The password change already succeeded; a notification failure
        // must not roll it back.
        let message = password_changed_email(&user);
        if let Err(e) = self.email_sender.send(&message).await {
            tracing::error!(
                user_id = %user.id(),
                "Failed to send password-change confirmation: {}",
                e
            );
        }

        Ok(tokens)
    }

    async fn reset_password(&self, email: String) -> Result<PasswordResetOutcome, AuthError> {
        let email = EmailAddress::new(email).map_err(|_| AuthError::InvalidCredentials)?;

        // Unknown email folds into the generic failure: a reset request
        // must not reveal whether the account exists.
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let recipient = user.clone();
        let temporary_password = self.apply_temporary_password(user).await?;

        let message = temporary_password_email(&recipient, &temporary_password);
        if let Err(e) = self.email_sender.send(&message).await {
            tracing::error!(
                user_id = %recipient.id(),
                "Failed to deliver temporary-password email: {}",
                e
            );
        }

        Ok(PasswordResetOutcome { temporary_password })
    }

    async fn reset_user_password(
        &self,
        target_user_id: UserId,
        admin_user_id: UserId,
    ) -> Result<AdminPasswordResetOutcome, AuthError> {
        // Authorization gates fail closed: a missing acting user, a
        // missing company id on either side, or a mismatch all deny.
        let admin = self
            .users
            .find_by_id(&admin_user_id)
            .await?
            .ok_or(AuthError::Forbidden)?;

        if !admin.is_company_admin() {
            return Err(AuthError::Forbidden);
        }

        let target = self
            .users
            .find_by_id(&target_user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(target_user_id.to_string()))?;

        match (admin.company_id(), target.company_id()) {
            (Some(admin_company), Some(target_company)) if admin_company == target_company => {}
            _ => return Err(AuthError::Forbidden),
        }

        let recipient = target.clone();
        let temporary_password = self.apply_temporary_password(target).await?;

        let message = temporary_password_email(&recipient, &temporary_password);
        if let Err(e) = self.email_sender.send(&message).await {
            tracing::error!(
                user_id = %recipient.id(),
                "Failed to deliver temporary-password email: {}",
                e
            );
        }

        Ok(AdminPasswordResetOutcome {
            email: recipient.email().as_str().to_string(),
            full_name: recipient.full_name(),
            temporary_password,
        })
    }

    async fn send_validation_email(
        &self,
        user_id: UserId,
    ) -> Result<ValidationEmailOutcome, AuthError> {
        let user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;

        if user.is_email_validated() {
            return Err(AuthError::EmailAlreadyValidated);
        }
        if self.validations.has_active_token_for_user(&user_id).await? {
            return Err(AuthError::ValidationTokenOutstanding);
        }

        self.issue_and_send_validation(&user).await
    }

    async fn validate_email(&self, token: String) -> Result<EmailValidatedOutcome, AuthError> {
        // Token checks run before loading the user, to fail fast.
        let validation = self
            .validations
            .find_by_token(&token)
            .await?
            .ok_or(AuthError::ValidationTokenNotFound)?;

        if validation.is_used() {
            return Err(AuthError::ValidationTokenUsed);
        }
        if validation.is_expired() {
            return Err(AuthError::ValidationTokenExpired);
        }

        let user = self
            .users
            .find_by_id(&validation.user_id())
            .await?
            .ok_or_else(|| AuthError::UserNotFound(validation.user_id().to_string()))?;

        if user.is_email_validated() {
            return Err(AuthError::EmailAlreadyValidated);
        }

        let mut validation = validation;
        let mut user = user;
        validation.mark_used()?;
        user.validate_email()?;

        // The user's flag is persisted before the token is consumed: a
        // crash between the two writes leaves an unspent token on a
        // validated account, never a consumed token on an unvalidated one.
        let user = self.users.update(user).await?;
        self.validations.update(validation).await?;

        Ok(EmailValidatedOutcome {
            user_id: user.id(),
            email: user.email().as_str().to_string(),
        })
    }

    async fn create_user(&self, command: CreateUserCommand) -> Result<CreatedUser, AuthError> {
        if let Some(existing) = self.users.find_by_email(&command.email).await? {
            return Err(AuthError::EmailAlreadyExists(
                existing.email().as_str().to_string(),
            ));
        }

        let temporary_password = self.policy.generate_temporary_password();
        let password_hash = self.hasher.hash(&temporary_password)?;

        let user = User::register(
            command.first_name,
            command.last_name,
            command.email,
            password_hash,
            temporary_password.clone(),
            command.company_id,
            command.is_company_admin,
        );
        let user = self.users.create(user).await?;

        // Registration already succeeded; the ownership proof can be
        // re-requested later.
        if let Err(e) = self.issue_and_send_validation(&user).await {
            tracing::warn!(
                user_id = %user.id(),
                "Could not start email validation for new user: {}",
                e
            );
        }

        Ok(CreatedUser {
            user,
            temporary_password,
        })
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        first_name: PersonName,
        last_name: PersonName,
    ) -> Result<User, AuthError> {
        let mut user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;

        user.update_profile(first_name, last_name);
        Ok(self.users.update(user).await?)
    }
}

fn validation_email(user: &User, token: &str) -> EmailMessage {
    EmailMessage::new(
        user.email().as_str(),
        "Validate your email address",
        format!(
            "Hello {},\n\n\
             Please validate your email address using the following code:\n\n\
             {}\n\n\
             The code expires in 24 hours.\n",
            user.first_name(),
            token
        ),
    )
}

fn temporary_password_email(user: &User, temporary_password: &str) -> EmailMessage {
    EmailMessage::new(
        user.email().as_str(),
        "Your temporary password",
        format!(
            "Hello {},\n\n\
             Your password has been reset. Sign in with the temporary password below;\n\
             you will be asked to choose a new one:\n\n\
             {}\n",
            user.first_name(),
            temporary_password
        ),
    )
}

fn password_changed_email(user: &User) -> EmailMessage {
    EmailMessage::new(
        user.email().as_str(),
        "Your password was changed",
        format!(
            "Hello {},\n\n\
             Your password was changed just now. If this was not you, contact\n\
             your administrator immediately.\n",
            user.first_name()
        ),
    )
}

#[cfg(test)]
mod tests {
    use auth::TokenConfig;
    use mockall::mock;
    use mockall::predicate::*;
    use mockall::Sequence;

    use super::*;
    use crate::domain::email::errors::EmailSendError;
    use crate::domain::email_validation::errors::EmailValidationError;
    use crate::domain::email_validation::models::EmailValidationId;
    use crate::domain::session::errors::SessionError;
    use crate::domain::session::models::SessionId;
    use crate::domain::user::errors::UserError;
    use crate::domain::user::models::CompanyId;
    use uuid::Uuid;

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, user: User) -> Result<User, UserError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;
            async fn update(&self, user: User) -> Result<User, UserError>;
        }
    }

    mock! {
        pub TestSessionRepository {}

        #[async_trait]
        impl SessionRepository for TestSessionRepository {
            async fn create(&self, session: UserSession) -> Result<UserSession, SessionError>;
            async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Option<UserSession>, SessionError>;
            async fn update(&self, session: UserSession) -> Result<UserSession, SessionError>;
            async fn deactivate_all_for_user(&self, user_id: &UserId) -> Result<(), SessionError>;
        }
    }

    mock! {
        pub TestEmailValidationRepository {}

        #[async_trait]
        impl EmailValidationRepository for TestEmailValidationRepository {
            async fn create(&self, validation: EmailValidation) -> Result<EmailValidation, EmailValidationError>;
            async fn find_by_token(&self, token: &str) -> Result<Option<EmailValidation>, EmailValidationError>;
            async fn update(&self, validation: EmailValidation) -> Result<EmailValidation, EmailValidationError>;
            async fn delete(&self, id: &EmailValidationId) -> Result<(), EmailValidationError>;
            async fn has_active_token_for_user(&self, user_id: &UserId) -> Result<bool, EmailValidationError>;
        }
    }

    mock! {
        pub TestEmailSender {}

        #[async_trait]
        impl EmailSender for TestEmailSender {
            async fn send(&self, message: &EmailMessage) -> Result<(), EmailSendError>;
        }
    }

    fn service(
        users: MockTestUserRepository,
        sessions: MockTestSessionRepository,
        validations: MockTestEmailValidationRepository,
        sender: MockTestEmailSender,
    ) -> AuthService<
        MockTestUserRepository,
        MockTestSessionRepository,
        MockTestEmailValidationRepository,
        MockTestEmailSender,
    > {
        let issuer = TokenIssuer::new(&TokenConfig {
            secret: "test_secret_key_at_least_32_bytes!".to_string(),
            issuer: "identity-service".to_string(),
            audience: "identity-clients".to_string(),
            access_token_minutes: 15,
        });

        AuthService::new(
            Arc::new(users),
            Arc::new(sessions),
            Arc::new(validations),
            Arc::new(sender),
            Arc::new(issuer),
            PasswordPolicy::default(),
            Duration::days(7),
        )
    }

    fn hashed(password: &str) -> String {
        PasswordHasher::new().hash(password).unwrap()
    }

    /// Active, validated user with the given stored password hash.
    fn active_user(email: &str, password_hash: String) -> User {
        let mut user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new(email.to_string()).unwrap(),
            password_hash,
            "Temp123!".to_string(),
            None,
            false,
        );
        user.validate_email().unwrap();
        user.clear_temporary_password();
        user
    }

    fn company_user(email: &str, company: Option<CompanyId>, is_admin: bool) -> User {
        let mut user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new(email.to_string()).unwrap(),
            hashed("Password1!"),
            "Temp123!".to_string(),
            company,
            is_admin,
        );
        user.validate_email().unwrap();
        user.clear_temporary_password();
        user
    }

    fn active_session(user_id: UserId, refresh_token: &str) -> UserSession {
        let mut session = UserSession::new_for_login(
            user_id,
            refresh_token.to_string(),
            Utc::now() + Duration::days(7),
            None,
            None,
        );
        session.attach_access_token("old.access.token".to_string());
        session
    }

    #[tokio::test]
    async fn test_login_success_opens_single_session() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        let user_id = user.id();

        let found = user.clone();
        users
            .expect_find_by_email()
            .withf(|email| email.as_str() == "alice@example.com")
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        users
            .expect_update()
            .withf(|u| u.last_login_at().is_some())
            .times(1)
            .returning(|u| Ok(u));

        // Old sessions go first; only then is the new one created.
        let mut seq = Sequence::new();
        sessions
            .expect_deactivate_all_for_user()
            .withf(move |id| *id == user_id)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sessions
            .expect_create()
            .withf(|s| s.access_token().is_empty() && s.is_active())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|s| Ok(s));
        sessions
            .expect_update()
            .withf(|s| !s.access_token().is_empty())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|s| Ok(s));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .login(LoginCommand {
                email: "alice@example.com".to_string(),
                password: "Password1!".to_string(),
                user_agent: Some("test-agent".to_string()),
                ip_address: Some("127.0.0.1".to_string()),
            })
            .await
            .expect("Login should succeed");

        assert!(!outcome.requires_password_change);
        assert!(outcome.is_email_validated);
        let tokens = outcome.tokens.expect("Tokens should be issued");
        assert!(!tokens.access_token.is_empty());
        assert!(!tokens.refresh_token.is_empty());
        assert!(tokens.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_login_unknown_email_is_generic() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(users, sessions, validations, sender);

        let result = service
            .login(LoginCommand {
                email: "nobody@example.com".to_string(),
                password: "Password1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_inactive_user_is_generic() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let mut user = active_user("alice@example.com", hashed("Password1!"));
        user.deactivate();
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .login(LoginCommand {
                email: "alice@example.com".to_string(),
                password: "Password1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unvalidated_email_is_distinct() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        // Registered but never validated.
        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Password1!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .login(LoginCommand {
                email: "alice@example.com".to_string(),
                password: "Password1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::EmailNotValidated)));
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_generic() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .login(LoginCommand {
                email: "alice@example.com".to_string(),
                password: "WrongPass1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_required_change_short_circuits_without_tokens() {
        let mut users = MockTestUserRepository::new();
        // No session expectations: nothing may touch the session store.
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let mut user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        user.validate_email().unwrap();
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .login(LoginCommand {
                email: "alice@example.com".to_string(),
                password: "Temp123!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await
            .expect("Login should report the pending change, not fail");

        assert!(outcome.requires_password_change);
        assert!(outcome.tokens.is_none());
    }

    #[tokio::test]
    async fn test_refresh_rotates_both_tokens_and_keeps_session_id() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        let session = active_session(user.id(), "old-refresh-token");
        let session_id = session.id();

        sessions
            .expect_find_by_refresh_token()
            .with(eq("old-refresh-token"))
            .times(1)
            .returning(move |_| Ok(Some(session.clone())));
        sessions
            .expect_update()
            .withf(move |s| {
                s.id() == session_id
                    && s.refresh_token() != "old-refresh-token"
                    && s.access_token() != "old.access.token"
                    && s.last_used_at().is_some()
            })
            .times(1)
            .returning(|s| Ok(s));

        let found = user.clone();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .refresh_token(RefreshCommand {
                refresh_token: "old-refresh-token".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await
            .expect("Refresh should succeed");

        assert_ne!(outcome.tokens.refresh_token, "old-refresh-token");
        assert_eq!(outcome.user_id, user.id());
    }

    #[tokio::test]
    async fn test_refresh_unknown_token_fails() {
        let users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        sessions
            .expect_find_by_refresh_token()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(users, sessions, validations, sender);

        let result = service
            .refresh_token(RefreshCommand {
                refresh_token: "unknown".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_deactivated_session_fails() {
        let users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let mut session = active_session(UserId::new(), "refresh-token");
        session.deactivate();
        sessions
            .expect_find_by_refresh_token()
            .times(1)
            .returning(move |_| Ok(Some(session.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .refresh_token(RefreshCommand {
                refresh_token: "refresh-token".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_expired_session_fails_even_if_flagged_active() {
        let users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let session = UserSession::from_storage(
            SessionId::new(),
            UserId::new(),
            "access".to_string(),
            "refresh-token".to_string(),
            Utc::now() - Duration::days(8),
            Utc::now() - Duration::days(1),
            None,
            true,
            None,
            None,
        );
        sessions
            .expect_find_by_refresh_token()
            .times(1)
            .returning(move |_| Ok(Some(session.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .refresh_token(RefreshCommand {
                refresh_token: "refresh-token".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_inactive_user_fails() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let mut user = active_user("alice@example.com", hashed("Password1!"));
        let session = active_session(user.id(), "refresh-token");
        user.deactivate();

        sessions
            .expect_find_by_refresh_token()
            .times(1)
            .returning(move |_| Ok(Some(session.clone())));
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .refresh_token(RefreshCommand {
                refresh_token: "refresh-token".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_change_password_success_cuts_all_sessions() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("OldPass1!"));
        let user_id = user.id();
        let old_hash = user.password_hash().to_string();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(move |u| u.password_hash() != old_hash)
            .times(1)
            .returning(|u| Ok(u));
        sessions
            .expect_deactivate_all_for_user()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        service
            .change_password(ChangePasswordCommand {
                user_id,
                current_password: "OldPass1!".to_string(),
                new_password: "NewPass1!".to_string(),
            })
            .await
            .expect("Change should succeed");
    }

    #[tokio::test]
    async fn test_change_password_wrong_current_fails() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("OldPass1!"));
        let user_id = user.id();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .change_password(ChangePasswordCommand {
                user_id,
                current_password: "Wrong1!aa".to_string(),
                new_password: "NewPass1!".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_change_password_policy_violation_is_specific() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("OldPass1!"));
        let user_id = user.id();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .change_password(ChangePasswordCommand {
                user_id,
                current_password: "OldPass1!".to_string(),
                new_password: "weak".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::PasswordPolicy(_))));
    }

    #[tokio::test]
    async fn test_change_password_reuse_fails() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("SamePass1!"));
        let user_id = user.id();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .change_password(ChangePasswordCommand {
                user_id,
                current_password: "SamePass1!".to_string(),
                new_password: "SamePass1!".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::PasswordReuse)));
    }

    #[tokio::test]
    async fn test_force_password_change_success_opens_session() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let mut user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        user.validate_email().unwrap();
        let user_id = user.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|u| !u.requires_password_change() && u.temporary_password().is_none())
            .times(1)
            .returning(|u| Ok(u));

        sessions
            .expect_deactivate_all_for_user()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));
        sessions.expect_create().times(1).returning(|s| Ok(s));
        sessions.expect_update().times(1).returning(|s| Ok(s));

        sender.expect_send().times(1).returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        let tokens = service
            .force_password_change(ForcePasswordChangeCommand {
                user_id,
                temporary_password: "Temp123!".to_string(),
                new_password: "NewPass1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await
            .expect("Forced change should succeed");

        assert!(!tokens.access_token.is_empty());
        assert!(!tokens.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_force_password_change_survives_email_failure() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let mut user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        user.validate_email().unwrap();
        let user_id = user.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update().times(1).returning(|u| Ok(u));
        sessions
            .expect_deactivate_all_for_user()
            .times(1)
            .returning(|_| Ok(()));
        sessions.expect_create().times(1).returning(|s| Ok(s));
        sessions.expect_update().times(1).returning(|s| Ok(s));

        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailSendError::DeliveryFailed("smtp down".to_string())));

        let service = service(users, sessions, validations, sender);

        // The credential change must not roll back for a notification.
        let result = service
            .force_password_change(ForcePasswordChangeCommand {
                user_id,
                temporary_password: "Temp123!".to_string(),
                new_password: "NewPass1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_force_password_change_wrong_temporary_fails() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        let user_id = user.id();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .force_password_change(ForcePasswordChangeCommand {
                user_id,
                temporary_password: "NotTheTemp1!".to_string(),
                new_password: "NewPass1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_force_password_change_without_pending_change_fails() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        let user_id = user.id();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .force_password_change(ForcePasswordChangeCommand {
                user_id,
                temporary_password: "Temp123!".to_string(),
                new_password: "NewPass1!".to_string(),
                user_agent: None,
                ip_address: None,
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_reset_password_issues_policy_compliant_temporary() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|u| u.requires_password_change() && u.temporary_password().is_some())
            .times(1)
            .returning(|u| Ok(u));
        sessions
            .expect_deactivate_all_for_user()
            .times(1)
            .returning(|_| Ok(()));
        sender.expect_send().times(1).returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .reset_password("alice@example.com".to_string())
            .await
            .expect("Reset should succeed");

        assert!(PasswordPolicy::default()
            .validate(&outcome.temporary_password)
            .is_ok());
    }

    #[tokio::test]
    async fn test_reset_password_unknown_email_is_generic() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(users, sessions, validations, sender);

        let result = service.reset_password("nobody@example.com".to_string()).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_reset_password_email_failure_is_swallowed() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update().times(1).returning(|u| Ok(u));
        sessions
            .expect_deactivate_all_for_user()
            .times(1)
            .returning(|_| Ok(()));
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailSendError::DeliveryFailed("smtp down".to_string())));

        let service = service(users, sessions, validations, sender);

        // The reset already happened; delivery failure is logged only.
        let result = service.reset_password("alice@example.com".to_string()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_admin_reset_success() {
        let mut users = MockTestUserRepository::new();
        let mut sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let company = CompanyId(Uuid::new_v4());
        let admin = company_user("admin@example.com", Some(company), true);
        let target = company_user("worker@example.com", Some(company), false);
        let admin_id = admin.id();
        let target_id = target.id();

        let found_admin = admin.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == admin_id)
            .times(1)
            .returning(move |_| Ok(Some(found_admin.clone())));
        let found_target = target.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == target_id)
            .times(1)
            .returning(move |_| Ok(Some(found_target.clone())));
        users
            .expect_update()
            .withf(|u| u.requires_password_change())
            .times(1)
            .returning(|u| Ok(u));
        sessions
            .expect_deactivate_all_for_user()
            .withf(move |id| *id == target_id)
            .times(1)
            .returning(|_| Ok(()));
        sender.expect_send().times(1).returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .reset_user_password(target_id, admin_id)
            .await
            .expect("Admin reset should succeed");

        assert_eq!(outcome.email, "worker@example.com");
        assert!(!outcome.temporary_password.is_empty());
    }

    #[tokio::test]
    async fn test_admin_reset_requires_admin_flag() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let company = CompanyId(Uuid::new_v4());
        let not_admin = company_user("user@example.com", Some(company), false);
        let acting_id = not_admin.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(not_admin.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.reset_user_password(UserId::new(), acting_id).await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_admin_reset_denies_cross_company() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let admin = company_user("admin@example.com", Some(CompanyId(Uuid::new_v4())), true);
        let target = company_user("worker@example.com", Some(CompanyId(Uuid::new_v4())), false);
        let admin_id = admin.id();
        let target_id = target.id();

        let found_admin = admin.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == admin_id)
            .times(1)
            .returning(move |_| Ok(Some(found_admin.clone())));
        let found_target = target.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == target_id)
            .times(1)
            .returning(move |_| Ok(Some(found_target.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.reset_user_password(target_id, admin_id).await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_admin_reset_fails_closed_without_company() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        // Admin flag set but no company id: deny on ambiguity.
        let admin = company_user("admin@example.com", None, true);
        let target = company_user("worker@example.com", Some(CompanyId(Uuid::new_v4())), false);
        let admin_id = admin.id();
        let target_id = target.id();

        let found_admin = admin.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == admin_id)
            .times(1)
            .returning(move |_| Ok(Some(found_admin.clone())));
        let found_target = target.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == target_id)
            .times(1)
            .returning(move |_| Ok(Some(found_target.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.reset_user_password(target_id, admin_id).await;
        assert!(matches!(result, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_send_validation_email_success() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        let user_id = user.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        validations
            .expect_has_active_token_for_user()
            .times(1)
            .returning(|_| Ok(false));
        validations
            .expect_create()
            .withf(|v| v.is_valid())
            .times(1)
            .returning(|v| Ok(v));
        sender
            .expect_send()
            .withf(|m| m.to == "alice@example.com")
            .times(1)
            .returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .send_validation_email(user_id)
            .await
            .expect("Send should succeed");

        assert!(!outcome.token.is_empty());
        assert!(outcome.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_send_validation_email_refused_when_already_validated() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        let user_id = user.id();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.send_validation_email(user_id).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyValidated)));
    }

    #[tokio::test]
    async fn test_send_validation_email_refused_while_token_outstanding() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        let user_id = user.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        validations
            .expect_has_active_token_for_user()
            .times(1)
            .returning(|_| Ok(true));

        let service = service(users, sessions, validations, sender);

        let result = service.send_validation_email(user_id).await;
        assert!(matches!(result, Err(AuthError::ValidationTokenOutstanding)));
    }

    #[tokio::test]
    async fn test_send_validation_email_compensates_on_delivery_failure() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        let user_id = user.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        validations
            .expect_has_active_token_for_user()
            .times(1)
            .returning(|_| Ok(false));
        validations.expect_create().times(1).returning(|v| Ok(v));
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(EmailSendError::DeliveryFailed("smtp down".to_string())));
        // The token must not outlive a failed send.
        validations.expect_delete().times(1).returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        let result = service.send_validation_email(user_id).await;
        assert!(matches!(result, Err(AuthError::EmailDelivery(_))));
    }

    #[tokio::test]
    async fn test_validate_email_success() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        let user_id = user.id();
        let validation = EmailValidation::with_default_expiration(user_id, "tok-1".to_string());

        validations
            .expect_find_by_token()
            .with(eq("tok-1"))
            .times(1)
            .returning(move |_| Ok(Some(validation.clone())));
        validations
            .expect_update()
            .withf(|v| v.is_used() && v.used_at().is_some())
            .times(1)
            .returning(|v| Ok(v));
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|u| u.is_email_validated())
            .times(1)
            .returning(|u| Ok(u));

        let service = service(users, sessions, validations, sender);

        let outcome = service
            .validate_email("tok-1".to_string())
            .await
            .expect("Validation should succeed");

        assert_eq!(outcome.user_id, user_id);
        assert_eq!(outcome.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_validate_email_persists_user_before_consuming_token() {
        // A crash between the two writes must never leave a consumed
        // token on a still-unvalidated account.
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();
        let mut seq = Sequence::new();

        let user = User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("alice@example.com".to_string()).unwrap(),
            hashed("Temp123!"),
            "Temp123!".to_string(),
            None,
            false,
        );
        let validation = EmailValidation::with_default_expiration(user.id(), "tok-1".to_string());

        validations
            .expect_find_by_token()
            .with(eq("tok-1"))
            .times(1)
            .returning(move |_| Ok(Some(validation.clone())));
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|u| u.is_email_validated())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|u| Ok(u));
        validations
            .expect_update()
            .withf(|v| v.is_used())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|v| Ok(v));

        let service = service(users, sessions, validations, sender);

        service
            .validate_email("tok-1".to_string())
            .await
            .expect("Validation should succeed");
    }

    #[tokio::test]
    async fn test_validate_email_used_token_fails_before_loading_user() {
        // No user-repository expectations: fail fast on the token alone.
        let users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let mut validation =
            EmailValidation::with_default_expiration(UserId::new(), "tok-1".to_string());
        validation.mark_used().unwrap();

        validations
            .expect_find_by_token()
            .times(1)
            .returning(move |_| Ok(Some(validation.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.validate_email("tok-1".to_string()).await;
        assert!(matches!(result, Err(AuthError::ValidationTokenUsed)));
    }

    #[tokio::test]
    async fn test_validate_email_expired_token_fails() {
        let users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let validation = EmailValidation::from_storage(
            EmailValidationId::new(),
            UserId::new(),
            "tok-1".to_string(),
            Utc::now() - Duration::hours(25),
            Utc::now() - Duration::hours(1),
            false,
            None,
        );

        validations
            .expect_find_by_token()
            .times(1)
            .returning(move |_| Ok(Some(validation.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.validate_email("tok-1".to_string()).await;
        assert!(matches!(result, Err(AuthError::ValidationTokenExpired)));
    }

    #[tokio::test]
    async fn test_validate_email_unknown_token_fails() {
        let users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        validations
            .expect_find_by_token()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(users, sessions, validations, sender);

        let result = service.validate_email("unknown".to_string()).await;
        assert!(matches!(result, Err(AuthError::ValidationTokenNotFound)));
    }

    #[tokio::test]
    async fn test_validate_email_already_validated_user_fails() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        let validation = EmailValidation::with_default_expiration(user.id(), "tok-1".to_string());

        validations
            .expect_find_by_token()
            .times(1)
            .returning(move |_| Ok(Some(validation.clone())));
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service.validate_email("tok-1".to_string()).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyValidated)));
    }

    #[tokio::test]
    async fn test_create_user_success() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let mut validations = MockTestEmailValidationRepository::new();
        let mut sender = MockTestEmailSender::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|u| {
                !u.is_email_validated()
                    && u.requires_password_change()
                    && u.password_hash().starts_with("$argon2")
            })
            .times(1)
            .returning(|u| Ok(u));
        validations.expect_create().times(1).returning(|v| Ok(v));
        sender.expect_send().times(1).returning(|_| Ok(()));

        let service = service(users, sessions, validations, sender);

        let created = service
            .create_user(CreateUserCommand {
                first_name: PersonName::new("Alice".to_string()).unwrap(),
                last_name: PersonName::new("Smith".to_string()).unwrap(),
                email: EmailAddress::new("alice@example.com".to_string()).unwrap(),
                company_id: None,
                is_company_admin: false,
            })
            .await
            .expect("Creation should succeed");

        assert!(PasswordPolicy::default()
            .validate(&created.temporary_password)
            .is_ok());
        assert!(created
            .user
            .has_valid_temporary_password(&created.temporary_password));
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let existing = active_user("alice@example.com", hashed("Password1!"));
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));

        let service = service(users, sessions, validations, sender);

        let result = service
            .create_user(CreateUserCommand {
                first_name: PersonName::new("Alice".to_string()).unwrap(),
                last_name: PersonName::new("Smith".to_string()).unwrap(),
                email: EmailAddress::new("alice@example.com".to_string()).unwrap(),
                company_id: None,
                is_company_admin: false,
            })
            .await;

        assert!(matches!(result, Err(AuthError::EmailAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let mut users = MockTestUserRepository::new();
        let sessions = MockTestSessionRepository::new();
        let validations = MockTestEmailValidationRepository::new();
        let sender = MockTestEmailSender::new();

        let user = active_user("alice@example.com", hashed("Password1!"));
        let user_id = user.id();

        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update()
            .withf(|u| u.full_name() == "Alicia Smythe")
            .times(1)
            .returning(|u| Ok(u));

        let service = service(users, sessions, validations, sender);

        let updated = service
            .update_profile(
                user_id,
                PersonName::new("Alicia".to_string()).unwrap(),
                PersonName::new("Smythe".to_string()).unwrap(),
            )
            .await
            .expect("Update should succeed");

        assert_eq!(updated.full_name(), "Alicia Smythe");
    }
}
