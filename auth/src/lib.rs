//! Authentication infrastructure library
//!
//! Provides the reusable building blocks of the credential lifecycle:
//! - Password hashing (Argon2id) with a uniform-failure verify
//! - Password policy validation and temporary-password generation
//! - Signed access tokens and opaque refresh tokens
//!
//! The service crate composes these into the authentication flows; this
//! crate holds no persistence and no flow logic.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! assert!(!hasher.verify("wrong_password", &hash));
//! ```
//!
//! ## Password Policy
//! ```
//! use auth::PasswordPolicy;
//!
//! let policy = PasswordPolicy::default();
//! let generated = policy.generate_temporary_password();
//! assert!(policy.validate(&generated).is_ok());
//! ```
//!
//! ## Tokens
//! ```
//! use auth::{TokenConfig, TokenIssuer, TokenIdentity};
//! use uuid::Uuid;
//!
//! let issuer = TokenIssuer::new(&TokenConfig {
//!     secret: "secret_key_at_least_32_bytes_long!!".to_string(),
//!     issuer: "identity-service".to_string(),
//!     audience: "identity-clients".to_string(),
//!     access_token_minutes: 15,
//! });
//! let issued = issuer
//!     .issue_access_token(&TokenIdentity {
//!         user_id: Uuid::new_v4(),
//!         email: "alice@example.com".to_string(),
//!         company_id: None,
//!         session_id: Uuid::new_v4(),
//!         is_admin: false,
//!     })
//!     .unwrap();
//! assert!(issuer.validate_access_token(&issued.token).is_some());
//! ```

pub mod password;
pub mod token;

// Re-export commonly used items
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordPolicy;
pub use password::PolicyViolation;
pub use token::random_token;
pub use token::AccessTokenClaims;
pub use token::IssuedAccessToken;
pub use token::TokenConfig;
pub use token::TokenError;
pub use token::TokenIdentity;
pub use token::TokenIssuer;
