//! Request and response envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::mail::{MailError, MailErrorKind};

/// Session identifier.
pub type SessionId = Uuid;

/// Caller-supplied correlation id (JSON-RPC `id`: number or string).
pub type RequestId = Value;

/// One tool call routed to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl RequestEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<RequestId>,
        session_id: SessionId,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            session_id,
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Closed set of failure kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    SessionNotFound,
    SessionClosing,
    AuthFailure,
    TransportFailure,
    InvalidRecipient,
    Unknown,
}

impl From<MailErrorKind> for ErrorKind {
    fn from(kind: MailErrorKind) -> Self {
        match kind {
            MailErrorKind::AuthFailure => Self::AuthFailure,
            MailErrorKind::TransportFailure => Self::TransportFailure,
            MailErrorKind::InvalidRecipient => Self::InvalidRecipient,
            MailErrorKind::Unknown => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::SessionNotFound => "session_not_found",
            Self::SessionClosing => "session_closing",
            Self::AuthFailure => "auth_failure",
            Self::TransportFailure => "transport_failure",
            Self::InvalidRecipient => "invalid_recipient",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Outcome carried by a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Tool completed; short human-readable confirmation.
    Success { message: String },
    /// Tool failed.
    Error { kind: ErrorKind, message: String },
}

/// Exactly one per accepted request, delivered on the submitting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn success(request_id: RequestId, message: impl Into<String>) -> Self {
        Self {
            request_id,
            payload: ResponsePayload::Success {
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn error(request_id: RequestId, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            request_id,
            payload: ResponsePayload::Error {
                kind,
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn from_mail_error(request_id: RequestId, err: &MailError) -> Self {
        Self::error(request_id, err.kind.into(), err.detail.clone())
    }

    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        match self.payload {
            ResponsePayload::Success { .. } => ResponseStatus::Success,
            ResponsePayload::Error { .. } => ResponseStatus::Error,
        }
    }

    /// Error kind, if this is an error response.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self.payload {
            ResponsePayload::Success { .. } => None,
            ResponsePayload::Error { kind, .. } => Some(kind),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status() == ResponseStatus::Error
    }
}
