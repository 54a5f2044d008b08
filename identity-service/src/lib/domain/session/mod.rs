pub mod errors;
pub mod models;
pub mod ports;

pub use errors::SessionError;
pub use models::SessionId;
pub use models::UserSession;
