//! Session lifecycle and routing for the mail MCP server.
//!
//! Provides:
//! - `SessionManager` - Create, route to and tear down sessions
//! - `Session` - Per-connection state machine with a single ordered writer
//! - `ResponseSequencer` - Reorder completions into submission order
//! - `InboundMessage` / `OutboundMessage` - Transport-neutral session I/O

pub mod manager;
pub mod message;
pub mod sequencer;
pub mod session;

pub use manager::{SessionError, SessionManager};
pub use message::{InboundMessage, OutboundMessage};
pub use sequencer::ResponseSequencer;
pub use session::{CloseReason, Session, SessionState};
