// src/notify/mod.rs
pub mod sendgrid;
pub mod smtp;

use anyhow::Result;

use crate::config::{secrets::Secrets, EmailProvider};

/// The assembled digest, ready for a transport.
#[derive(Debug, Clone)]
pub struct DigestEmail {
    pub subject: String,
    /// Markdown, sent as the plain-text body.
    pub body: String,
}

#[async_trait::async_trait]
pub trait DigestSender: Send + Sync {
    async fn send(&self, email: &DigestEmail) -> Result<()>;
    fn transport_name(&self) -> &'static str;
}

/// Build the transport the config selects. Credential presence was already
/// checked by `Secrets::from_env`, so a miss here is a programming error
/// surfaced as a config error, not a panic.
pub fn build_sender(
    provider: EmailProvider,
    secrets: &Secrets,
) -> Result<Box<dyn DigestSender>> {
    match provider {
        EmailProvider::Smtp => {
            let creds = secrets
                .smtp
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("smtp selected but no SMTP credentials loaded"))?;
            Ok(Box::new(smtp::SmtpSender::new(
                creds,
                &secrets.sender,
                &secrets.recipient,
            )?))
        }
        EmailProvider::Sendgrid => {
            let key = secrets.sendgrid_api_key.as_deref().ok_or_else(|| {
                anyhow::anyhow!("sendgrid selected but no SENDGRID_API_KEY loaded")
            })?;
            Ok(Box::new(sendgrid::SendGridSender::new(
                key,
                &secrets.sender,
                &secrets.recipient,
            )))
        }
    }
}
