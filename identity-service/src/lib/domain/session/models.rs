use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::session::errors::SessionIdError;
use crate::domain::user::models::UserId;

/// Session unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, SessionIdError> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|e| SessionIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One logical "logged in" instance: a user bound to an access/refresh
/// token pair plus client metadata.
///
/// Created in two phases: the record exists with an empty access token
/// first, because the access token's claims embed the session's own id.
#[derive(Debug, Clone)]
pub struct UserSession {
    id: SessionId,
    user_id: UserId,
    access_token: String,
    refresh_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    is_active: bool,
    user_agent: Option<String>,
    ip_address: Option<String>,
}

impl UserSession {
    /// Start a new session with an empty access token; the real token is
    /// attached once it has been minted against this session's id.
    pub fn new_for_login(
        user_id: UserId,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            access_token: String::new(),
            refresh_token,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            is_active: true,
            user_agent,
            ip_address,
        }
    }

    /// Rehydrate a session from persisted state. Only the repository
    /// layer should call this.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: SessionId,
        user_id: UserId,
        access_token: String,
        refresh_token: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        last_used_at: Option<DateTime<Utc>>,
        is_active: bool,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            access_token,
            refresh_token,
            created_at,
            expires_at,
            last_used_at,
            is_active,
            user_agent,
            ip_address,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Attach the access token minted against this session's id.
    pub fn attach_access_token(&mut self, access_token: String) {
        self.access_token = access_token;
    }

    /// Rotate both tokens together and stamp last use. The pair always
    /// advances as a unit; never one side alone.
    pub fn rotate_tokens(
        &mut self,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.expires_at = expires_at;
        self.last_used_at = Some(Utc::now());
    }

    pub fn mark_used(&mut self) {
        self.last_used_at = Some(Utc::now());
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Expiry is evaluated at read time; the active flag alone is never
    /// trusted.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn test_session(expires_at: DateTime<Utc>) -> UserSession {
        UserSession::new_for_login(
            UserId::new(),
            "refresh-token".to_string(),
            expires_at,
            Some("test-agent".to_string()),
            Some("127.0.0.1".to_string()),
        )
    }

    #[test]
    fn test_new_session_has_empty_access_token() {
        let session = test_session(Utc::now() + Duration::days(7));

        assert!(session.access_token().is_empty());
        assert!(session.is_active());
        assert!(session.last_used_at().is_none());
    }

    #[test]
    fn test_attach_access_token() {
        let mut session = test_session(Utc::now() + Duration::days(7));
        session.attach_access_token("signed.jwt.token".to_string());
        assert_eq!(session.access_token(), "signed.jwt.token");
    }

    #[test]
    fn test_rotate_tokens_replaces_pair_and_stamps_use() {
        let mut session = test_session(Utc::now() + Duration::days(7));
        session.attach_access_token("old-access".to_string());
        let id_before = session.id();

        let new_expiry = Utc::now() + Duration::days(14);
        session.rotate_tokens("new-access".to_string(), "new-refresh".to_string(), new_expiry);

        assert_eq!(session.access_token(), "new-access");
        assert_eq!(session.refresh_token(), "new-refresh");
        assert_eq!(session.expires_at(), new_expiry);
        assert!(session.last_used_at().is_some());
        // Session identity is preserved across rotation.
        assert_eq!(session.id(), id_before);
    }

    #[test]
    fn test_expiry_checked_at_read_time() {
        let session = test_session(Utc::now() - Duration::seconds(1));

        // Still flagged active, but expired by the clock.
        assert!(session.is_active());
        assert!(session.is_expired());
    }

    #[test]
    fn test_deactivate() {
        let mut session = test_session(Utc::now() + Duration::days(7));
        session.deactivate();
        assert!(!session.is_active());
    }
}
