//! Map relay failures onto the closed mail error set.

use lettre::transport::smtp::{self, response::Code};
use mailmcp_core::MailErrorKind;

/// Classify an SMTP reply code.
#[must_use]
pub const fn classify_code(code: u16) -> MailErrorKind {
    match code {
        // 454 temporary auth failure, 530 auth required, 534/535 rejected credentials
        454 | 530 | 534 | 535 => MailErrorKind::AuthFailure,
        501 | 510 | 511 | 550 | 551 | 553 => MailErrorKind::InvalidRecipient,
        400..=499 => MailErrorKind::TransportFailure,
        _ => MailErrorKind::Unknown,
    }
}

/// Numeric form of a reply code.
fn code_number(code: Code) -> Option<u16> {
    code.to_string().parse().ok()
}

/// Classify an error returned by the relay transport.
#[must_use]
pub fn classify_error(err: &smtp::Error) -> MailErrorKind {
    if err.is_timeout() {
        return MailErrorKind::TransportFailure;
    }
    if let Some(number) = err.status().and_then(code_number) {
        return classify_code(number);
    }
    if err.is_client() && is_auth_negotiation(&err.to_string()) {
        return MailErrorKind::AuthFailure;
    }
    // Client-side protocol errors (missing STARTTLS, bad greeting),
    // unparseable replies, connection, network and TLS errors.
    MailErrorKind::TransportFailure
}

/// Whether a client error came from credential negotiation.
fn is_auth_negotiation(message: &str) -> bool {
    message.to_ascii_lowercase().contains("authentication")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_codes() {
        for code in [454, 530, 534, 535] {
            assert_eq!(classify_code(code), MailErrorKind::AuthFailure, "{code}");
        }
    }

    #[test]
    fn test_recipient_codes() {
        for code in [501, 550, 551, 553] {
            assert_eq!(classify_code(code), MailErrorKind::InvalidRecipient, "{code}");
        }
    }

    #[test]
    fn test_auth_negotiation_messages() {
        assert!(is_auth_negotiation(
            "internal client error: No compatible authentication mechanism was found"
        ));
        assert!(!is_auth_negotiation(
            "internal client error: STARTTLS is not supported on this server"
        ));
    }

    #[test]
    fn test_other_codes() {
        assert_eq!(classify_code(421), MailErrorKind::TransportFailure);
        assert_eq!(classify_code(451), MailErrorKind::TransportFailure);
        assert_eq!(classify_code(552), MailErrorKind::Unknown);
        assert_eq!(classify_code(554), MailErrorKind::Unknown);
    }
}
