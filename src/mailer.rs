use crate::config::EmailConfig;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email delivery is not configured")]
    NotConfigured,
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Sends the run summary to one fixed recipient over SMTP with STARTTLS
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn recipient(&self) -> &str {
        &self.config.recipient
    }

    /// Builds a multipart message with a single plain-text part
    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message, MailError> {
        if self.config.sender.is_empty() || self.config.recipient.is_empty() {
            return Err(MailError::NotConfigured);
        }

        let from: Mailbox = self.config.sender.parse()?;
        let to: Mailbox = self.config.recipient.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::mixed().singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(body.to_string()),
                ),
            )?;

        Ok(message)
    }

    /// One delivery attempt, no retry
    pub async fn deliver(&self, subject: &str, body: &str) -> Result<(), MailError> {
        let message = self.build_message(subject, body)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.login().to_string(),
                self.config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(self.config.timeout_seconds)))
            .build();

        tracing::debug!(
            "Submitting message to {}:{} as {}",
            self.config.smtp_server, self.config.smtp_port, self.config.login()
        );
        transport.send(message).await?;
        Ok(())
    }

    /// Delivers and logs the result; failures never escape as errors
    pub async fn notify(&self, subject: &str, body: &str) -> bool {
        match self.deliver(subject, body).await {
            Ok(()) => {
                tracing::info!("✅ Email sent successfully to {}", self.recipient());
                true
            }
            Err(e) => {
                tracing::error!("❌ Failed to send email: {}", e);
                false
            }
        }
    }
}
