//! Transport-neutral session input and output.

use mailmcp_core::{RequestEnvelope, RequestId, ResponseEnvelope, ToolDefinition};

/// JSON-RPC code for an internal failure.
pub const INTERNAL_ERROR: i64 = -32603;

/// A parsed client frame routed to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Session handshake.
    Initialize {
        request_id: RequestId,
        protocol_version: Option<String>,
    },
    /// Keepalive.
    Ping { request_id: RequestId },
    /// Tool catalog query.
    ListTools { request_id: RequestId },
    /// Tool invocation.
    CallTool(RequestEnvelope),
    /// A request the protocol layer could not map; answered with this error in order.
    Invalid {
        request_id: RequestId,
        code: i64,
        message: String,
    },
    /// Fire-and-forget frame; never answered.
    Notification { method: String },
}

impl InboundMessage {
    /// Correlation id, if this message expects a reply.
    #[must_use]
    pub const fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Initialize { request_id, .. }
            | Self::Ping { request_id }
            | Self::ListTools { request_id }
            | Self::Invalid { request_id, .. } => Some(request_id),
            Self::CallTool(envelope) => Some(&envelope.request_id),
            Self::Notification { .. } => None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Ping { .. } => "ping",
            Self::ListTools { .. } => "tools/list",
            Self::CallTool(_) => "tools/call",
            Self::Invalid { .. } => "invalid",
            Self::Notification { method } => method,
        }
    }
}

/// A frame pushed down a session's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Handshake reply; the protocol layer negotiates the version.
    Initialized {
        request_id: RequestId,
        protocol_version: Option<String>,
    },
    Pong { request_id: RequestId },
    Tools {
        request_id: RequestId,
        tools: Vec<ToolDefinition>,
    },
    ToolResult(ResponseEnvelope),
    ProtocolError {
        request_id: RequestId,
        code: i64,
        message: String,
    },
}

impl OutboundMessage {
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        match self {
            Self::Initialized { request_id, .. }
            | Self::Pong { request_id }
            | Self::Tools { request_id, .. }
            | Self::ProtocolError { request_id, .. } => request_id,
            Self::ToolResult(envelope) => &envelope.request_id,
        }
    }
}
