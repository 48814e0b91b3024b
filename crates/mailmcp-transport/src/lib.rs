//! Transport layer for the mail MCP server.
//!
//! Provides:
//! - Wire protocol (JSON-RPC 2.0 frames as used by MCP)
//! - SSE transport: stream, message and health endpoints (feature: sse)

pub mod protocol;

#[cfg(feature = "sse")]
pub mod sse;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

#[cfg(feature = "sse")]
pub use sse::create_router;
