pub mod email_validation;
pub mod session;
pub mod user;
