pub mod errors;
pub mod models;
pub mod ports;

pub use errors::EmailSendError;
pub use models::EmailMessage;
pub use ports::EmailSender;
