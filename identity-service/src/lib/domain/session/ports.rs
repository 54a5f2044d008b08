use async_trait::async_trait;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::UserSession;
use crate::domain::user::models::UserId;

/// Persistence operations for user sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Persist a new session record.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn create(&self, session: UserSession) -> Result<UserSession, SessionError>;

    /// Retrieve a session by its opaque refresh token.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserSession>, SessionError>;

    /// Persist the current state of an existing session.
    ///
    /// # Errors
    /// * `NotFound` - Session does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update(&self, session: UserSession) -> Result<UserSession, SessionError>;

    /// Deactivate every active session for a user. Runs before a new
    /// session is created so a crash in between leaves the user with
    /// zero active sessions, not two.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn deactivate_all_for_user(&self, user_id: &UserId) -> Result<(), SessionError>;
}
