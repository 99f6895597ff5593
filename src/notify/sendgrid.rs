// src/notify/sendgrid.rs
//! Transactional-API transport: one JSON POST to SendGrid's v3 mail-send
//! endpoint, bounded retries with exponential backoff.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{DigestEmail, DigestSender};

const SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridSender {
    api_key: String,
    from: String,
    to: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SendGridSender {
    pub fn new(api_key: &str, from: &str, to: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn payload(&self, email: &DigestEmail) -> MailSendPayload {
        MailSendPayload {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: self.to.clone(),
                }],
            }],
            from: Address {
                email: self.from.clone(),
            },
            subject: email.subject.clone(),
            content: vec![Content {
                content_type: "text/plain".to_string(),
                value: email.body.clone(),
            }],
        }
    }
}

#[async_trait::async_trait]
impl DigestSender for SendGridSender {
    async fn send(&self, email: &DigestEmail) -> Result<()> {
        let payload = self.payload(email);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(SEND_URL)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("SendGrid HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("SendGrid request failed: {e}"));
                }
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "sendgrid"
    }
}

#[derive(Serialize)]
struct MailSendPayload {
    personalizations: Vec<Personalization>,
    from: Address,
    subject: String,
    content: Vec<Content>,
}

#[derive(Serialize)]
struct Personalization {
    to: Vec<Address>,
}

#[derive(Serialize)]
struct Address {
    email: String,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}
