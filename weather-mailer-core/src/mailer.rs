//! Outbound mail.
//!
//! Two delivery modes: [`send_all`] stops at the first
//! failure and reports it, [`fan_out`] sends to everyone independently and
//! only logs failures.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::{fmt::Debug, sync::Arc};
use tokio::task::JoinHandle;

use crate::error::MailError;

/// One plain-text email to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// SMTP relay with username/password auth (e.g. a Gmail app password).
#[derive(Clone)]
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from.to_string()).finish_non_exhaustive()
    }
}

impl SmtpMailer {
    pub fn new(relay: &str, address: &str, app_password: &str) -> Result<Self, MailError> {
        let from = parse_mailbox(address)?;
        let creds = Credentials::new(address.to_string(), app_password.to_string());
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?.credentials(creds).build();

        Ok(Self { from, transport })
    }

    /// Check that the relay accepts our connection and credentials.
    pub async fn verify(&self) -> Result<bool, MailError> {
        Ok(self.transport.test_connection().await?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Send to each recipient in order, stopping at the first failure.
///
/// Returns how many messages went out before the failure, if any.
pub async fn send_all(
    mailer: &dyn Mailer,
    recipients: &[String],
    subject: &str,
    body: &str,
) -> Result<usize, MailError> {
    for (sent, to) in recipients.iter().enumerate() {
        let email =
            OutgoingEmail { to: to.clone(), subject: subject.to_string(), body: body.to_string() };

        if let Err(e) = mailer.send(&email).await {
            tracing::warn!(recipient = %to, sent, remaining = recipients.len() - sent, "send aborted");
            return Err(e);
        }
        tracing::info!(recipient = %to, subject, "email sent");
    }
    Ok(recipients.len())
}

/// Send to every recipient concurrently; one failure never affects another.
///
/// The returned handles may be ignored.
pub fn fan_out(
    mailer: Arc<dyn Mailer>,
    recipients: &[String],
    subject: &str,
    body: &str,
) -> Vec<JoinHandle<()>> {
    recipients
        .iter()
        .map(|to| {
            let mailer = Arc::clone(&mailer);
            let email = OutgoingEmail {
                to: to.clone(),
                subject: subject.to_string(),
                body: body.to_string(),
            };
            tokio::spawn(async move {
                match mailer.send(&email).await {
                    Ok(()) => tracing::info!(recipient = %email.to, "alert sent"),
                    Err(e) => {
                        tracing::error!(recipient = %email.to, error = %e, "failed to send alert")
                    }
                }
            })
        })
        .collect()
}
