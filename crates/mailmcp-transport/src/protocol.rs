//! Wire protocol for client-server communication.
//!
//! Clients speak JSON-RPC 2.0. Requests arrive on the message endpoint;
//! responses leave on the session stream.

use mailmcp_core::{RequestEnvelope, ResponseEnvelope, SessionId};
use mailmcp_session::{InboundMessage, OutboundMessage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// JSON-RPC protocol version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Name reported in the handshake and health check.
pub const SERVER_NAME: &str = "email-sender-mcp";

/// Server version reported in the handshake and health check.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = mailmcp_session::message::INTERNAL_ERROR;

    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Request or notification from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent (or null) for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Parse a message-endpoint body.
    ///
    /// # Errors
    /// Returns a parse error for malformed JSON and an invalid-request error
    /// for JSON that is not a JSON-RPC 2.0 request.
    pub fn parse(body: &[u8]) -> Result<Self, JsonRpcError> {
        let request: Self = serde_json::from_slice(body).map_err(|e| {
            let code = if e.is_data() {
                JsonRpcError::INVALID_REQUEST
            } else {
                JsonRpcError::PARSE_ERROR
            };
            JsonRpcError::new(code, e.to_string())
        })?;

        if request.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcError {
                code: JsonRpcError::INVALID_REQUEST,
                message: "Invalid JSON-RPC version".into(),
                data: Some(json!({"expected": JSONRPC_VERSION, "got": request.jsonrpc})),
            });
        }
        Ok(request)
    }

    /// Map onto a session input.
    #[must_use]
    pub fn into_inbound(self, session_id: SessionId) -> InboundMessage {
        let Some(request_id) = self.id else {
            return InboundMessage::Notification {
                method: self.method,
            };
        };
        let params = self.params.unwrap_or(Value::Null);

        match self.method.as_str() {
            "initialize" => InboundMessage::Initialize {
                request_id,
                protocol_version: params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "ping" => InboundMessage::Ping { request_id },
            "tools/list" => InboundMessage::ListTools { request_id },
            "tools/call" => match tool_call(&params) {
                Ok((tool_name, arguments)) => InboundMessage::CallTool(RequestEnvelope::new(
                    request_id, session_id, tool_name, arguments,
                )),
                Err(message) => InboundMessage::Invalid {
                    request_id,
                    code: JsonRpcError::INVALID_PARAMS,
                    message,
                },
            },
            other => InboundMessage::Invalid {
                request_id,
                code: JsonRpcError::METHOD_NOT_FOUND,
                message: format!("Method not found: {other}"),
            },
        }
    }
}

fn tool_call(params: &Value) -> Result<(String, Map<String, Value>), String> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| "Missing 'name' parameter".to_string())?;

    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err("'arguments' must be an object".into()),
    };
    Ok((name.to_string(), arguments))
}

/// Response sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl From<OutboundMessage> for JsonRpcResponse {
    fn from(message: OutboundMessage) -> Self {
        match message {
            OutboundMessage::Initialized {
                request_id,
                protocol_version,
            } => Self::success(
                request_id,
                json!({
                    "protocolVersion": negotiate_version(protocol_version.as_deref()),
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
                }),
            ),
            OutboundMessage::Pong { request_id } => Self::success(request_id, json!({})),
            OutboundMessage::Tools { request_id, tools } => {
                Self::success(request_id, json!({ "tools": tools }))
            }
            OutboundMessage::ToolResult(envelope) => {
                let result = tool_result(&envelope);
                Self::success(envelope.request_id, result)
            }
            OutboundMessage::ProtocolError {
                request_id,
                code,
                message,
            } => Self::error(request_id, JsonRpcError::new(code, message)),
        }
    }
}

/// Echo the client's revision when supported, otherwise offer the newest.
#[must_use]
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v).copied())
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

/// MCP `tools/call` result for an envelope.
#[must_use]
pub fn tool_result(envelope: &ResponseEnvelope) -> Value {
    let payload = json!(envelope.payload);
    json!({
        "content": [{"type": "text", "text": payload.to_string()}],
        "structuredContent": payload,
        "isError": envelope.is_error(),
    })
}
