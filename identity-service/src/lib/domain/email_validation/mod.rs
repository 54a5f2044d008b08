pub mod errors;
pub mod models;
pub mod ports;

pub use errors::EmailValidationError;
pub use models::EmailValidation;
pub use models::EmailValidationId;
