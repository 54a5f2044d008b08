use async_trait::async_trait;

use crate::domain::email::errors::EmailSendError;
use crate::domain::email::models::EmailMessage;

/// Outbound email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    /// Deliver a rendered message.
    ///
    /// # Errors
    /// * `InvalidAddress` - Recipient or sender address is malformed
    /// * `DeliveryFailed` - SMTP delivery failed
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSendError>;
}
