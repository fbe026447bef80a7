use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::{Notice, SessionResult};

/// Everything a background session hands back to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One line for the status log
    Status(String),
    /// A blocking acknowledgment dialog
    Alert(Notice),
    /// Always the last event of a session
    Finished(SessionResult),
}

/// Producer half of the status channel.
///
/// The background task never touches UI state. It posts events here and the
/// iced runtime delivers them to `update` on the event loop in post order.
#[derive(Debug, Clone)]
pub struct StatusRelay {
    tx: UnboundedSender<SessionEvent>,
}

impl StatusRelay {
    pub fn channel() -> (Self, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, rx)
    }

    pub fn post(&self, message: impl Into<String>) {
        self.send(SessionEvent::Status(message.into()));
    }

    pub fn alert(&self, notice: Notice) {
        self.send(SessionEvent::Alert(notice));
    }

    pub fn finish(&self, result: SessionResult) {
        self.send(SessionEvent::Finished(result));
    }

    fn send(&self, event: SessionEvent) {
        // Only fails once the window has gone away.
        if let Err(e) = self.tx.unbounded_send(event) {
            tracing::debug!(event = ?e.into_inner(), "status relay closed, dropping event");
        }
    }
}
