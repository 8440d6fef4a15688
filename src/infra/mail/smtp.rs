// SMTP mail transport built on lettre's async Tokio executor.

use crate::config::MailConfig;
use crate::core::notify::{EmailMessage, MailError, MailTransport};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid mail sender address '{}': {}", config.sender, e))?;

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| MailError::Transport(format!("invalid recipient: {}", e)))?;

        let email = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(message.subject)
            .body(message.body)
            .map_err(|e| MailError::Transport(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Transport used when no SMTP server is configured. Logs the subject
/// and drops the message, which keeps local development mail-free.
pub struct DiscardMailer;

#[async_trait]
impl MailTransport for DiscardMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "No SMTP server configured, dropping notification email"
        );
        Ok(())
    }
}
