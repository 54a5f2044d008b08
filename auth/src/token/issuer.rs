use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;

use super::claims::AccessTokenClaims;
use super::errors::TokenError;

/// Number of random bytes in an opaque refresh token.
const REFRESH_TOKEN_BYTES: usize = 64;

/// Token issuing configuration.
///
/// Loaded once at startup and injected into the issuer; immutable for
/// the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Shared signing secret (at least 32 bytes for HS256)
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Access token lifetime in minutes
    pub access_token_minutes: i64,
}

/// Identity embedded into an access token's claims.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub company_id: Option<Uuid>,
    pub session_id: Uuid,
    pub is_admin: bool,
}

/// A freshly minted access token together with its expiry instant.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Creates and validates access tokens, and mints opaque refresh tokens.
///
/// Access tokens are HS256-signed JWTs validated without a store lookup.
/// Refresh tokens carry no claims; their validity is proven solely by a
/// matching active session record.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_token_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm: Algorithm::HS256,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_lifetime: Duration::minutes(config.access_token_minutes),
        }
    }

    /// Mint a signed access token for the given identity.
    ///
    /// Embeds subject, email, a fresh unique token id, the session id,
    /// the admin flag, and the company id when present.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token signing failed
    pub fn issue_access_token(
        &self,
        identity: &TokenIdentity,
    ) -> Result<IssuedAccessToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.access_token_lifetime;

        let claims = AccessTokenClaims {
            sub: identity.user_id.to_string(),
            email: identity.email.clone(),
            jti: Uuid::new_v4().to_string(),
            sid: identity.session_id.to_string(),
            company_id: identity.company_id.map(|id| id.to_string()),
            is_admin: identity.is_admin,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let header = Header::new(self.algorithm);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))?;

        Ok(IssuedAccessToken { token, expires_at })
    }

    /// Produce an opaque refresh token: 64 cryptographically random
    /// bytes, base64-encoded. Carries no embedded claims.
    pub fn issue_refresh_token(&self) -> String {
        random_token(REFRESH_TOKEN_BYTES)
    }

    /// Validate an access token and return its claims.
    ///
    /// Enforces signature, issuer, audience, and expiry with zero clock
    /// skew. Any failure (malformed, expired, wrong signature) resolves
    /// to `None`; callers never see the underlying error.
    pub fn validate_access_token(&self, token: &str) -> Option<AccessTokenClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Read the expiration instant out of a token without validating it.
    ///
    /// Returns the Unix epoch on any error.
    pub fn expiration_of(&self, token: &str) -> DateTime<Utc> {
        let mut validation = Validation::new(self.algorithm);
        validation.insecure_disable_signature_validation();
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_aud = false;

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .ok()
            .and_then(|data| DateTime::from_timestamp(data.claims.exp, 0))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn access_token_lifetime(&self) -> Duration {
        self.access_token_lifetime
    }
}

/// Generate an opaque token of `bytes` random bytes, base64-encoded.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    BASE64.encode(&buf)
}
