use serde::Deserialize;
use serde::Serialize;

/// Claims carried by a signed access token.
///
/// The session id travels as a claim so that validation never needs a
/// store lookup; revoking the session only takes effect for tokens
/// minted after the revocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Subject (user identifier)
    pub sub: String,

    /// User email address
    pub email: String,

    /// Unique token identifier
    pub jti: String,

    /// Session identifier the token was minted against
    pub sid: String,

    /// Company the user belongs to, absent for users without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,

    /// Company-admin flag
    pub is_admin: bool,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_id_omitted_when_absent() {
        let claims = AccessTokenClaims {
            sub: "user123".to_string(),
            email: "alice@example.com".to_string(),
            jti: "token123".to_string(),
            sid: "session123".to_string(),
            company_id: None,
            is_admin: false,
            exp: 2000,
            iat: 1000,
            iss: "identity-service".to_string(),
            aud: "identity-clients".to_string(),
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("company_id").is_none());
    }

    #[test]
    fn test_company_id_present_when_set() {
        let claims = AccessTokenClaims {
            sub: "user123".to_string(),
            email: "alice@example.com".to_string(),
            jti: "token123".to_string(),
            sid: "session123".to_string(),
            company_id: Some("company123".to_string()),
            is_admin: true,
            exp: 2000,
            iat: 1000,
            iss: "identity-service".to_string(),
            aud: "identity-clients".to_string(),
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["company_id"], "company123");
    }
}
