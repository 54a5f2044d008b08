pub mod claims;
pub mod errors;
pub mod issuer;

pub use claims::AccessTokenClaims;
pub use errors::TokenError;
pub use issuer::random_token;
pub use issuer::IssuedAccessToken;
pub use issuer::TokenConfig;
pub use issuer::TokenIdentity;
pub use issuer::TokenIssuer;
