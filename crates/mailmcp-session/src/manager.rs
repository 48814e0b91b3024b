//! Session manager for routing requests to sessions.

use std::{collections::HashMap, sync::Arc};

use mailmcp_core::{
    ErrorKind, RequestEnvelope, RequestId, ResponseEnvelope, SessionId, ToolDispatcher,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    message::{INTERNAL_ERROR, InboundMessage, OutboundMessage},
    session::{CloseReason, Session, SessionState},
};

/// Session routing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Session is closing: {0}")]
    Closing(SessionId),
}

impl SessionError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::SessionNotFound,
            Self::Closing(_) => ErrorKind::SessionClosing,
        }
    }

    /// Error envelope for the rejected request.
    #[must_use]
    pub fn to_response(&self, request_id: RequestId) -> ResponseEnvelope {
        ResponseEnvelope::error(request_id, self.kind(), self.to_string())
    }
}

/// Session manager.
///
/// Owns the routing table. Every lookup, insert and removal goes through
/// one lock, so a request can never be accepted by a session that has
/// started closing.
pub struct SessionManager {
    dispatcher: Arc<ToolDispatcher>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionManager {
    /// Create a new session manager.
    #[must_use]
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The dispatcher tool calls are forwarded to.
    #[must_use]
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Register a new stream. The session takes exclusive ownership of `sink`.
    pub fn on_connect(&self, sink: mpsc::UnboundedSender<OutboundMessage>) -> SessionId {
        let session_id = Uuid::new_v4();
        let session = Session::spawn(session_id, sink);
        self.sessions.write().insert(session_id, session);
        tracing::info!(%session_id, "Session opened");
        session_id
    }

    /// Route one tool call to its session.
    ///
    /// # Errors
    /// Returns error if the session is unknown or closing; nothing is pushed
    /// on any stream in that case.
    pub fn on_request(
        self: &Arc<Self>,
        session_id: SessionId,
        request: RequestEnvelope,
    ) -> Result<(), SessionError> {
        self.on_message(session_id, InboundMessage::CallTool(request))
    }

    /// Route any inbound frame to its session.
    ///
    /// Replies are pushed asynchronously on the session's stream, in the
    /// order the frames were accepted here.
    ///
    /// # Errors
    /// Returns error if the session is unknown or closing.
    pub fn on_message(
        self: &Arc<Self>,
        session_id: SessionId,
        message: InboundMessage,
    ) -> Result<(), SessionError> {
        let (session, ticket) = {
            let sessions = self.sessions.read();
            let session = sessions
                .get(&session_id)
                .ok_or(SessionError::NotFound(session_id))?;

            if message.request_id().is_none() {
                match session.state() {
                    SessionState::Open => {}
                    SessionState::Closing => return Err(SessionError::Closing(session_id)),
                    SessionState::Closed => return Err(SessionError::NotFound(session_id)),
                }
                tracing::debug!(%session_id, method = message.label(), "Notification received");
                return Ok(());
            }

            let ticket = session.accept().map_err(|kind| match kind {
                ErrorKind::SessionClosing => SessionError::Closing(session_id),
                _ => SessionError::NotFound(session_id),
            })?;
            (Arc::clone(session), ticket)
        };

        tracing::debug!(
            %session_id,
            method = message.label(),
            request_id = ?message.request_id(),
            "Request accepted"
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let fallback = internal_error(&message);
            let handler = {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.handle(message).await })
            };
            let reply = match handler.await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(%session_id, "Request handler failed: {e}");
                    fallback
                }
            };
            if session.complete(ticket, reply) {
                manager.remove_closed(session_id);
            }
        });

        Ok(())
    }

    /// The stream for `session_id` went away.
    pub fn on_disconnect(&self, session_id: SessionId) {
        self.close(session_id, CloseReason::Disconnected);
    }

    /// Close every session. In-flight results are still delivered before
    /// each stream ends.
    pub fn shutdown(&self) {
        let ids: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        tracing::info!(sessions = ids.len(), "Shutting down sessions");
        for session_id in ids {
            self.close(session_id, CloseReason::Shutdown);
        }
    }

    /// Current state of a registered session.
    #[must_use]
    pub fn session_state(&self, session_id: SessionId) -> Option<SessionState> {
        self.sessions.read().get(&session_id).map(|s| s.state())
    }

    /// Number of registered sessions (open or draining).
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn close(&self, session_id: SessionId, reason: CloseReason) {
        let closed = {
            let sessions = self.sessions.read();
            let Some(session) = sessions.get(&session_id) else {
                tracing::debug!(%session_id, ?reason, "Close for unknown session");
                return;
            };
            session.begin_close(reason)
        };
        if closed {
            self.remove_closed(session_id);
        }
    }

    fn remove_closed(&self, session_id: SessionId) {
        let mut sessions = self.sessions.write();
        if sessions
            .get(&session_id)
            .is_some_and(|s| s.state() == SessionState::Closed)
        {
            sessions.remove(&session_id);
            tracing::debug!(%session_id, remaining = sessions.len(), "Session removed");
        }
    }

    async fn handle(&self, message: InboundMessage) -> OutboundMessage {
        match message {
            InboundMessage::Initialize {
                request_id,
                protocol_version,
            } => OutboundMessage::Initialized {
                request_id,
                protocol_version,
            },
            InboundMessage::Ping { request_id } => OutboundMessage::Pong { request_id },
            InboundMessage::ListTools { request_id } => OutboundMessage::Tools {
                request_id,
                tools: self.dispatcher.registry().list().to_vec(),
            },
            InboundMessage::CallTool(request) => {
                OutboundMessage::ToolResult(self.dispatcher.dispatch(request).await)
            }
            InboundMessage::Invalid {
                request_id,
                code,
                message,
            } => OutboundMessage::ProtocolError {
                request_id,
                code,
                message,
            },
            // Filtered out before acceptance.
            InboundMessage::Notification { method } => OutboundMessage::ProtocolError {
                request_id: RequestId::Null,
                code: INTERNAL_ERROR,
                message: format!("notification {method} has no reply"),
            },
        }
    }
}

/// Reply used if the handler task dies before producing one.
fn internal_error(message: &InboundMessage) -> OutboundMessage {
    let request_id = message.request_id().cloned().unwrap_or(RequestId::Null);
    match message {
        InboundMessage::CallTool(_) => OutboundMessage::ToolResult(ResponseEnvelope::error(
            request_id,
            ErrorKind::Unknown,
            "internal error while handling tool call",
        )),
        _ => OutboundMessage::ProtocolError {
            request_id,
            code: INTERNAL_ERROR,
            message: "internal error".into(),
        },
    }
}
