//! A single client session.

use std::sync::Arc;

use mailmcp_core::{ErrorKind, SessionId};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{message::OutboundMessage, sequencer::ResponseSequencer};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Stream connected, accepting requests.
    Open,
    /// No new requests; in-flight dispatches draining.
    Closing,
    /// Terminal.
    Closed,
}

/// Why a session left `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client went away; pending results are discarded.
    Disconnected,
    /// Server is stopping; pending results are still delivered.
    Shutdown,
}

/// Proof that a request was accepted; completing it releases the slot.
#[derive(Debug)]
#[must_use = "every ticket must be completed exactly once"]
pub struct Ticket {
    seq: u64,
}

enum WriterCommand {
    Deliver { seq: u64, message: OutboundMessage },
    Discard { seq: u64 },
    Close,
}

struct Inner {
    state: SessionState,
    reason: Option<CloseReason>,
    next_seq: u64,
    in_flight: usize,
}

/// One logical client connection.
///
/// The stream sink is owned by a single writer task; completions reach it
/// tagged with their acceptance sequence and are released in that order.
pub struct Session {
    id: SessionId,
    inner: Mutex<Inner>,
    writer: mpsc::UnboundedSender<WriterCommand>,
}

impl Session {
    /// Create an open session and spawn its writer task.
    pub(crate) fn spawn(id: SessionId, sink: mpsc::UnboundedSender<OutboundMessage>) -> Arc<Self> {
        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(id, rx, sink));
        Arc::new(Self {
            id,
            inner: Mutex::new(Inner {
                state: SessionState::Open,
                reason: None,
                next_seq: 0,
                in_flight: 0,
            }),
            writer,
        })
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Number of accepted requests not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Accept a request, reserving its place in the response order.
    pub(crate) fn accept(&self) -> Result<Ticket, ErrorKind> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Open => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.in_flight += 1;
                Ok(Ticket { seq })
            }
            SessionState::Closing => Err(ErrorKind::SessionClosing),
            SessionState::Closed => Err(ErrorKind::SessionNotFound),
        }
    }

    /// Hand a finished response to the writer.
    ///
    /// Returns `true` if this was the last in-flight request of a closing
    /// session, which is now `Closed`.
    pub(crate) fn complete(&self, ticket: Ticket, message: OutboundMessage) -> bool {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);

        let command = if inner.reason == Some(CloseReason::Disconnected) {
            tracing::debug!(
                session_id = %self.id,
                request_id = ?message.request_id(),
                "Discarding response for disconnected session"
            );
            WriterCommand::Discard { seq: ticket.seq }
        } else {
            WriterCommand::Deliver {
                seq: ticket.seq,
                message,
            }
        };
        let _ = self.writer.send(command);

        if inner.state == SessionState::Closing && inner.in_flight == 0 {
            self.finish(&mut inner);
            return true;
        }
        false
    }

    /// Leave `Open`. Returns `true` if nothing was in flight and the session
    /// is now `Closed`.
    pub(crate) fn begin_close(&self, reason: CloseReason) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Open => {
                inner.state = SessionState::Closing;
                inner.reason = Some(reason);
                tracing::info!(
                    session_id = %self.id,
                    ?reason,
                    in_flight = inner.in_flight,
                    "Session closing"
                );
                if inner.in_flight == 0 {
                    self.finish(&mut inner);
                    return true;
                }
                false
            }
            SessionState::Closing => {
                // A disconnect during shutdown drain: nobody is left to read.
                if reason == CloseReason::Disconnected {
                    inner.reason = Some(reason);
                }
                false
            }
            SessionState::Closed => false,
        }
    }

    fn finish(&self, inner: &mut Inner) {
        inner.state = SessionState::Closed;
        let _ = self.writer.send(WriterCommand::Close);
        tracing::info!(session_id = %self.id, "Session closed");
    }
}

/// Single owner of the session's stream sink.
async fn write_loop(
    id: SessionId,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
    sink: mpsc::UnboundedSender<OutboundMessage>,
) {
    let mut order = ResponseSequencer::new();

    while let Some(command) = rx.recv().await {
        let ready = match command {
            WriterCommand::Deliver { seq, message } => order.complete(seq, Some(message)),
            WriterCommand::Discard { seq } => order.complete(seq, None),
            WriterCommand::Close => break,
        };
        for message in ready.into_iter().flatten() {
            if sink.send(message).is_err() {
                tracing::debug!(session_id = %id, "Stream receiver gone, dropping response");
            }
        }
    }

    if order.buffered() > 0 {
        tracing::warn!(
            session_id = %id,
            buffered = order.buffered(),
            "Writer closed with undelivered responses"
        );
    }
    // Dropping `sink` ends the client's stream.
}
