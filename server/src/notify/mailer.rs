use std::{future::Future, time::Duration};

use rideshare_lib::notification::Notification;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Relay(#[from] reqwest::Error),

    #[error("mail rejected: {0}")]
    Rejected(String),
}

pub trait Mailer: Send + Sync + 'static {
    fn send(&self, notification: &Notification) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Writes notifications to the log instead of sending them.
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        tracing::info!(
            subject = %notification.subject,
            from = %notification.sender,
            to = ?notification.recipients,
            "{}",
            notification.body
        );
        Ok(())
    }
}

/// Posts notifications as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpMailer {
    pub fn new(relay_url: String) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            relay_url,
        })
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        let response = self.client.post(&self.relay_url)
            .json(notification)
            .send().await?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{status}: {}", reason.trim())));
        }
        Ok(())
    }
}
