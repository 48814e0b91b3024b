//! `MailSender` implementation over an SMTP relay.

use std::sync::Arc;

use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::{self, authentication::Credentials},
};
use mailmcp_core::{MailConfig, MailError, MailMessage, MailSender};

use crate::classify::classify_error;

/// Port for implicit TLS (SMTPS); every other port negotiates STARTTLS.
const SMTPS_PORT: u16 = 465;

/// Error building the relay transport at startup.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid sender address {address:?}: {reason}")]
    InvalidSender { address: String, reason: String },
    #[error("Relay setup failed: {0}")]
    Relay(#[from] smtp::Error),
}

/// Sends mail through the configured relay.
///
/// The transport is built once and pools its relay connections. Every
/// relay exchange is bounded by the configured timeout; nothing about the
/// message is retained.
pub struct SmtpMailSender {
    config: Arc<MailConfig>,
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailSender {
    /// Build a sender from the process-wide mail configuration.
    ///
    /// # Errors
    /// Returns error if the sender address does not parse or the relay
    /// transport cannot be configured.
    pub fn new(config: Arc<MailConfig>) -> Result<Self, SetupError> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|e: lettre::address::AddressError| SetupError::InvalidSender {
                address: config.sender.clone(),
                reason: e.to_string(),
            })?;

        let builder = if config.relay_port == SMTPS_PORT {
            SmtpTransport::relay(&config.relay_host)?
        } else {
            SmtpTransport::starttls_relay(&config.relay_host)?
        };

        let transport = builder
            .port(config.relay_port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        tracing::debug!(
            host = %config.relay_host,
            port = config.relay_port,
            timeout = ?config.timeout,
            "SMTP relay configured"
        );

        Ok(Self {
            config,
            from,
            transport,
        })
    }
}

impl MailSender for SmtpMailSender {
    fn sender_identity(&self) -> &str {
        &self.config.sender
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = MailMessage {
            from: self.config.sender.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        let email = build_message(&self.from, &message)?;

        let response = self.transport.send(&email).map_err(|e| {
            let kind = classify_error(&e);
            tracing::debug!(host = %self.config.relay_host, %kind, "Relay error: {e}");
            MailError::new(kind, e.to_string())
        })?;

        tracing::debug!(
            "Relay accepted message: {}",
            response.message().collect::<Vec<&str>>().join(" ")
        );
        Ok(())
    }
}

/// Build a plain-text UTF-8 message.
fn build_message(from: &Mailbox, message: &MailMessage) -> Result<Message, MailError> {
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| MailError::invalid_recipient(format!("{:?}: {e}", message.to)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| MailError::unknown(format!("failed to build message: {e}")))
}
