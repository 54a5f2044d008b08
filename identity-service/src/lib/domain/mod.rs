pub mod auth;
pub mod email;
pub mod email_validation;
pub mod session;
pub mod user;
