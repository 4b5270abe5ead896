//! Email delivery for round notifications.
//!
//! The email channel resolves the recipient's address from the directory and
//! hands a rendered message to whichever provider was compiled in.

#[cfg(feature = "email-resend")]
mod resend;
#[cfg(feature = "email-smtp")]
mod smtp;
mod templates;

pub use templates::NotificationEmailContent;

use crate::config::{EmailConfig, EmailProviderConfig};
use crate::directory::FileDirectory;
use async_trait::async_trait;
use rota_notify::{NotificationSender, NotifyError};
use rota_storage::OutboxMessage;
use std::sync::Arc;
use thiserror::Error;

/// Email sending error
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// Trait for email providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        content: &NotificationEmailContent,
        from_address: &str,
        from_name: Option<&str>,
    ) -> Result<(), EmailError>;
}

/// Create an email provider from configuration
pub fn create_provider(config: &EmailConfig) -> Result<Box<dyn EmailProvider>, EmailError> {
    match &config.provider {
        #[cfg(feature = "email-resend")]
        EmailProviderConfig::Resend { api_key } => {
            Ok(Box::new(resend::ResendProvider::new(api_key.clone())))
        }
        #[cfg(not(feature = "email-resend"))]
        EmailProviderConfig::Resend { .. } => Err(EmailError::ProviderNotAvailable(
            "Resend support not compiled in. Enable the 'email-resend' feature.".to_string(),
        )),
        #[cfg(feature = "email-smtp")]
        EmailProviderConfig::Smtp {
            host,
            port,
            username,
            password,
            use_tls,
        } => {
            let credentials = smtp::credentials(username.as_deref(), password.as_deref());
            let provider = smtp::SmtpProvider::new(host, *port, credentials, *use_tls)?;
            Ok(Box::new(provider))
        }
        #[cfg(not(feature = "email-smtp"))]
        EmailProviderConfig::Smtp { .. } => Err(EmailError::ProviderNotAvailable(
            "SMTP support not compiled in. Enable the 'email-smtp' feature.".to_string(),
        )),
    }
}

/// Delivers outbox messages on the email channel.
pub struct EmailSender {
    provider: Box<dyn EmailProvider>,
    directory: Arc<FileDirectory>,
    from_address: String,
    from_name: Option<String>,
}

impl EmailSender {
    pub fn new(
        provider: Box<dyn EmailProvider>,
        directory: Arc<FileDirectory>,
        config: &EmailConfig,
    ) -> Self {
        Self {
            provider,
            directory,
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
        }
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    async fn send(&self, message: &OutboxMessage) -> Result<(), NotifyError> {
        let to = self
            .directory
            .email_of(&message.recipient_id)
            .ok_or_else(|| NotifyError::NoAddress(message.recipient_id.clone()))?;
        let content = NotificationEmailContent::new(message);
        self.provider
            .send_email(to, &content, &self.from_address, self.from_name.as_deref())
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}
