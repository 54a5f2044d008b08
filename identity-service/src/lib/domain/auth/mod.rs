pub mod errors;
pub mod models;
pub mod ports;
pub mod service;

pub use errors::AuthError;
pub use ports::AuthServicePort;
pub use ports::CreatedUser;
pub use service::AuthService;
