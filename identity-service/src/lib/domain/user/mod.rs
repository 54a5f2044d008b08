pub mod errors;
pub mod models;
pub mod ports;

pub use errors::UserError;
pub use models::EmailAddress;
pub use models::User;
pub use models::UserId;
