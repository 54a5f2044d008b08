use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;
use serde::Deserialize;

use crate::domain::email::errors::EmailSendError;
use crate::domain::email::models::EmailMessage;
use crate::domain::email::ports::EmailSender;

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailSendError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| EmailSendError::DeliveryFailed(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSendError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailSendError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|_| EmailSendError::InvalidAddress(message.to.clone()))?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| EmailSendError::DeliveryFailed(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailSendError::DeliveryFailed(e.to_string()))?;

        tracing::debug!(to = %message.to, "Email delivered");

        Ok(())
    }
}
