//! SMTP relay adapter.
//!
//! Provides:
//! - `SmtpMailSender` - `MailSender` over an authenticated, encrypted relay
//! - Relay error classification into `MailErrorKind`

pub mod classify;
pub mod sender;

pub use sender::{SetupError, SmtpMailSender};
