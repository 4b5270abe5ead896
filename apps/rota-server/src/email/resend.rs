//! Resend email provider.

use super::{EmailError, EmailProvider, NotificationEmailContent};
use async_trait::async_trait;
use resend_rs::{types::CreateEmailBaseOptions, Resend};

pub struct ResendProvider {
    client: Resend,
}

impl ResendProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Resend::new(&api_key),
        }
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send_email(
        &self,
        to: &str,
        content: &NotificationEmailContent,
        from_address: &str,
        from_name: Option<&str>,
    ) -> Result<(), EmailError> {
        let from = match from_name {
            Some(name) => format!("{} <{}>", name, from_address),
            None => from_address.to_string(),
        };

        let email = CreateEmailBaseOptions::new(from, vec![to.to_string()], &content.subject)
            .with_text(&content.text)
            .with_html(&content.html);

        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}
