//! Core abstractions for the mail MCP server.
//!
//! This crate provides the fundamental building blocks:
//! - `ToolRegistry` - Fixed catalog of tool definitions
//! - `MailSender` - Contract for the external mail relay
//! - `ToolDispatcher` - Validate, invoke and normalize tool calls
//! - `RequestEnvelope` / `ResponseEnvelope` - Per-call correlation types
//! - `MailConfig` / `ServerConfig` - Startup configuration

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod mail;
pub mod registry;
pub mod templates;

pub use config::{ConfigError, MailConfig, ServerConfig};
pub use dispatcher::ToolDispatcher;
pub use envelope::{
    ErrorKind, RequestEnvelope, RequestId, ResponseEnvelope, ResponsePayload, ResponseStatus,
    SessionId,
};
pub use mail::{MailError, MailErrorKind, MailMessage, MailSender};
pub use registry::{
    FieldSpec, FieldType, InputSchema, RegistryError, ToolDefinition, ToolKind, ToolRegistry,
};
