//! Mail sender contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single outbound message. Built per send and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Configured sender identity.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Classification of a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailErrorKind {
    /// Relay rejected the credentials.
    AuthFailure,
    /// Network, TLS or protocol error talking to the relay, including timeouts.
    TransportFailure,
    /// The recipient address was rejected.
    InvalidRecipient,
    /// Anything not classified above.
    Unknown,
}

impl fmt::Display for MailErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthFailure => "authentication failure",
            Self::TransportFailure => "transport failure",
            Self::InvalidRecipient => "invalid recipient",
            Self::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// Mail sender error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct MailError {
    pub kind: MailErrorKind,
    pub detail: String,
}

impl MailError {
    #[must_use]
    pub fn new(kind: MailErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn auth(detail: impl Into<String>) -> Self {
        Self::new(MailErrorKind::AuthFailure, detail)
    }

    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(MailErrorKind::TransportFailure, detail)
    }

    #[must_use]
    pub fn invalid_recipient(detail: impl Into<String>) -> Self {
        Self::new(MailErrorKind::InvalidRecipient, detail)
    }

    #[must_use]
    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(MailErrorKind::Unknown, detail)
    }
}

/// Trait for the external mail relay.
///
/// `send` is synchronous and may block on the network. Callers must run it
/// off the async executor. Implementations perform exactly one attempt and
/// keep no per-message state.
pub trait MailSender: Send + Sync {
    /// Address messages are sent from.
    fn sender_identity(&self) -> &str;

    /// Send one plain-text message.
    ///
    /// # Errors
    /// Returns a classified [`MailError`] if the relay does not accept the message.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
