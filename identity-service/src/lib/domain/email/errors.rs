use thiserror::Error;

/// Error for outbound email delivery
#[derive(Debug, Clone, Error)]
pub enum EmailSendError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to deliver email: {0}")]
    DeliveryFailed(String),
}
