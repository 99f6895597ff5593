// src/notify/smtp.rs
use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{DigestEmail, DigestSender};
use crate::config::secrets::SmtpCreds;

pub struct SmtpSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpSender {
    pub fn new(creds: &SmtpCreds, from_addr: &str, to_addr: &str) -> Result<Self> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&creds.host)
            .context("invalid SMTP host")?
            .port(creds.port)
            .credentials(Credentials::new(creds.user.clone(), creds.pass.clone()))
            .build();

        let from = from_addr
            .parse()
            .with_context(|| format!("invalid sender address {from_addr:?}"))?;
        let to = to_addr
            .parse()
            .with_context(|| format!("invalid recipient address {to_addr:?}"))?;

        Ok(Self { mailer, from, to })
    }
}

#[async_trait::async_trait]
impl DigestSender for SmtpSender {
    async fn send(&self, email: &DigestEmail) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(&email.subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}
