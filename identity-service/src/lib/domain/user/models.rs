use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::user::errors::EmailError;
use crate::domain::user::errors::PersonNameError;
use crate::domain::user::errors::UserError;
use crate::domain::user::errors::UserIdError;

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Company unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(CompanyId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates format using an RFC 5322 compliant parser and normalizes
/// to lowercase; uniqueness is enforced against the normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated, normalized email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email.to_lowercase()))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Person name value type (first or last name).
///
/// Ensures the name is non-empty after trimming and at most 100 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl PersonName {
    const MAX_LENGTH: usize = 100;

    /// Create a new valid person name.
    ///
    /// # Errors
    /// * `Empty` - Name is empty or whitespace only
    /// * `TooLong` - Name is longer than 100 characters
    pub fn new(name: String) -> Result<Self, PersonNameError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PersonNameError::Empty);
        }
        let length = trimmed.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(PersonNameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// User identity aggregate.
///
/// Fields are private; every construction and mutation passes through
/// invariant-checking methods. Invariants held:
/// - `must_change_password` implies a non-null temporary-password marker
/// - the email can be validated at most once
/// - a user can authenticate only when active and email-validated
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    first_name: PersonName,
    last_name: PersonName,
    email: EmailAddress,
    password_hash: String,
    is_active: bool,
    is_email_validated: bool,
    must_change_password: bool,
    temporary_password: Option<String>,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
    email_validated_at: Option<DateTime<Utc>>,
    company_id: Option<CompanyId>,
    is_company_admin: bool,
}

impl User {
    /// Create a new user as the registration/admin-creation flows do:
    /// active, email not yet validated, holding a hashed temporary
    /// password that must be changed on first login.
    pub fn register(
        first_name: PersonName,
        last_name: PersonName,
        email: EmailAddress,
        temporary_password_hash: String,
        temporary_password: String,
        company_id: Option<CompanyId>,
        is_company_admin: bool,
    ) -> Self {
        Self {
            id: UserId::new(),
            first_name,
            last_name,
            email,
            password_hash: temporary_password_hash,
            is_active: true,
            is_email_validated: false,
            must_change_password: true,
            temporary_password: Some(temporary_password),
            created_at: Utc::now(),
            last_login_at: None,
            email_validated_at: None,
            company_id,
            is_company_admin,
        }
    }

    /// Rehydrate a user from persisted state. Only the repository layer
    /// should call this.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: UserId,
        first_name: PersonName,
        last_name: PersonName,
        email: EmailAddress,
        password_hash: String,
        is_active: bool,
        is_email_validated: bool,
        must_change_password: bool,
        temporary_password: Option<String>,
        created_at: DateTime<Utc>,
        last_login_at: Option<DateTime<Utc>>,
        email_validated_at: Option<DateTime<Utc>>,
        company_id: Option<CompanyId>,
        is_company_admin: bool,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            email,
            password_hash,
            is_active,
            is_email_validated,
            must_change_password,
            temporary_password,
            created_at,
            last_login_at,
            email_validated_at,
            company_id,
            is_company_admin,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn first_name(&self) -> &PersonName {
        &self.first_name
    }

    pub fn last_name(&self) -> &PersonName {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_email_validated(&self) -> bool {
        self.is_email_validated
    }

    pub fn temporary_password(&self) -> Option<&str> {
        self.temporary_password.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn email_validated_at(&self) -> Option<DateTime<Utc>> {
        self.email_validated_at
    }

    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    pub fn is_company_admin(&self) -> bool {
        self.is_company_admin
    }

    pub fn must_change_password(&self) -> bool {
        self.must_change_password
    }

    /// Whether the user may authenticate at all.
    pub fn can_login(&self) -> bool {
        self.is_active && self.is_email_validated
    }

    pub fn requires_password_change(&self) -> bool {
        self.must_change_password
    }

    /// Exact string match against the temporary-password marker.
    ///
    /// Deliberately a separate, weaker channel than the hashed-password
    /// check; gates only the one-time forced-change flow.
    pub fn has_valid_temporary_password(&self, candidate: &str) -> bool {
        matches!(&self.temporary_password, Some(stored) if stored == candidate)
    }

    pub fn update_profile(&mut self, first_name: PersonName, last_name: PersonName) {
        self.first_name = first_name;
        self.last_name = last_name;
    }

    /// Replace the stored password hash with a user-chosen one.
    pub fn update_password(&mut self, password_hash: String) {
        self.password_hash = password_hash;
    }

    /// Install a system-issued temporary password: the hash becomes the
    /// stored credential, the plaintext marker gates the forced-change
    /// flow, and a change becomes mandatory.
    pub fn set_temporary_password(&mut self, password_hash: String, temporary_password: String) {
        self.password_hash = password_hash;
        self.temporary_password = Some(temporary_password);
        self.must_change_password = true;
    }

    /// Drop the temporary-password marker and the forced-change flag.
    pub fn clear_temporary_password(&mut self) {
        self.temporary_password = None;
        self.must_change_password = false;
    }

    /// Mark the email as proven. One-way: a second call is an error.
    /// Reactivates the account if it was deactivated in the meantime.
    ///
    /// # Errors
    /// * `EmailAlreadyValidated` - The email was validated before
    pub fn validate_email(&mut self) -> Result<(), UserError> {
        if self.is_email_validated {
            return Err(UserError::EmailAlreadyValidated(self.id.to_string()));
        }
        self.is_email_validated = true;
        self.email_validated_at = Some(Utc::now());
        if !self.is_active {
            self.is_active = true;
        }
        Ok(())
    }

    pub fn set_must_change_password(&mut self, must_change: bool) {
        self.must_change_password = must_change;
    }

    pub fn set_company_admin(&mut self, is_admin: bool) {
        self.is_company_admin = is_admin;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn record_login(&mut self) {
        self.last_login_at = Some(Utc::now());
    }
}

/// Command to create a new user with domain types
#[derive(Debug)]
pub struct CreateUserCommand {
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: EmailAddress,
    pub company_id: Option<CompanyId>,
    pub is_company_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User::register(
            PersonName::new("Alice".to_string()).unwrap(),
            PersonName::new("Smith".to_string()).unwrap(),
            EmailAddress::new("Alice@Example.com".to_string()).unwrap(),
            "$argon2id$test_hash".to_string(),
            "Temp123!".to_string(),
            None,
            false,
        )
    }

    #[test]
    fn test_email_is_normalized() {
        let user = test_user();
        assert_eq!(user.email().as_str(), "alice@example.com");
    }

    #[test]
    fn test_registered_user_cannot_login_yet() {
        let user = test_user();
        assert!(user.is_active());
        assert!(!user.is_email_validated());
        assert!(!user.can_login());
        assert!(user.requires_password_change());
    }

    #[test]
    fn test_validate_email_is_one_way() {
        let mut user = test_user();

        assert!(user.validate_email().is_ok());
        assert!(user.is_email_validated());
        assert!(user.email_validated_at().is_some());
        assert!(user.can_login());

        // Validating twice is an error, not a no-op.
        assert!(matches!(
            user.validate_email(),
            Err(UserError::EmailAlreadyValidated(_))
        ));
    }

    #[test]
    fn test_validate_email_reactivates_account() {
        let mut user = test_user();
        user.deactivate();

        user.validate_email().unwrap();
        assert!(user.is_active());
    }

    #[test]
    fn test_temporary_password_marker() {
        let mut user = test_user();

        assert!(user.has_valid_temporary_password("Temp123!"));
        assert!(!user.has_valid_temporary_password("temp123!"));
        assert!(!user.has_valid_temporary_password(""));

        user.clear_temporary_password();
        assert!(!user.requires_password_change());
        assert!(!user.has_valid_temporary_password("Temp123!"));
    }

    #[test]
    fn test_set_temporary_password_forces_change() {
        let mut user = test_user();
        user.clear_temporary_password();

        user.set_temporary_password("$argon2id$new_hash".to_string(), "Fresh9$x".to_string());
        assert!(user.requires_password_change());
        assert_eq!(user.password_hash(), "$argon2id$new_hash");
        assert!(user.has_valid_temporary_password("Fresh9$x"));
    }

    #[test]
    fn test_person_name_rejects_empty() {
        assert!(matches!(
            PersonName::new("   ".to_string()),
            Err(PersonNameError::Empty)
        ));
    }

    #[test]
    fn test_person_name_trims() {
        let name = PersonName::new("  Alice ".to_string()).unwrap();
        assert_eq!(name.as_str(), "Alice");
    }

    #[test]
    fn test_email_rejects_invalid() {
        assert!(EmailAddress::new("not-an-email".to_string()).is_err());
    }
}
