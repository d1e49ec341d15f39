use crate::{config::MailConfig, error::MailError};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;

/// Delivers a plain-text notification to a list of recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns whether the message was handed to the relay. Failures are
    /// logged, never retried.
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> bool;
}

pub type SharedNotifier = Arc<dyn Notifier>;

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn credentials(&self) -> Result<(&str, &str), MailError> {
        match (
            self.config.sender_email.as_deref().filter(|v| !v.is_empty()),
            self.config.sender_password.as_deref().filter(|v| !v.is_empty()),
        ) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(MailError::MissingCredentials),
        }
    }

    fn build_message(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<Message, MailError> {
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let mut builder = Message::builder().from(parse_mailbox(sender)?).subject(subject);
        for recipient in recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        Ok(builder.multipart(MultiPart::mixed().singlepart(SinglePart::plain(body.to_string())))?)
    }

    async fn try_send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), MailError> {
        let (sender, password) = self.credentials()?;
        let message = self.build_message(sender, subject, body, recipients)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        mailer.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> bool {
        match self.try_send(subject, body, recipients).await {
            Ok(()) => {
                tracing::info!(recipients = ?recipients, subject, "email sent");
                true
            }
            Err(err @ (MailError::MissingCredentials | MailError::NoRecipients)) => {
                tracing::error!(error = %err, "email not configured, skipping send");
                false
            }
            Err(err) => {
                tracing::error!(error = %err, relay = %self.config.smtp_server, "failed to send email");
                false
            }
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}
