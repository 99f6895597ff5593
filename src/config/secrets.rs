// src/config/secrets.rs
//! Credentials come exclusively from the environment (.env in dev).
//! The TOML config never carries a key or password.

use anyhow::{Context, Result};

use super::EmailProvider;

#[derive(Debug, Clone)]
pub struct SmtpCreds {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct Secrets {
    pub gemini_api_key: String,
    pub sender: String,
    pub recipient: String,
    pub smtp: Option<SmtpCreds>,
    pub sendgrid_api_key: Option<String>,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing {name} env var"))
}

impl Secrets {
    /// Loads only what the selected transport needs; a missing SENDGRID key
    /// is fine when SMTP is configured, and vice versa.
    pub fn from_env(provider: EmailProvider) -> Result<Self> {
        let gemini_api_key = required("GEMINI_API_KEY")?;
        let sender = required("SENDER_EMAIL")?;
        let recipient = required("RECIPIENT_EMAIL")?;

        let (smtp, sendgrid_api_key) = match provider {
            EmailProvider::Smtp => {
                let host = required("SMTP_HOST")?;
                let port = std::env::var("SMTP_PORT")
                    .ok()
                    .map(|p| p.trim().parse::<u16>())
                    .transpose()
                    .context("SMTP_PORT is not a valid port number")?
                    .unwrap_or(587);
                // Username defaults to the sender address, as most relays expect.
                let user = std::env::var("SMTP_USER").unwrap_or_else(|_| sender.clone());
                let pass = required("SMTP_PASS")?;
                (
                    Some(SmtpCreds {
                        host,
                        port,
                        user,
                        pass,
                    }),
                    None,
                )
            }
            EmailProvider::Sendgrid => (None, Some(required("SENDGRID_API_KEY")?)),
        };

        Ok(Self {
            gemini_api_key,
            sender,
            recipient,
            smtp,
            sendgrid_api_key,
        })
    }
}
