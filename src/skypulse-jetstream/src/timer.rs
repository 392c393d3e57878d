//! Idle timer capability.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::machine::SessionId;
use crate::runner::{Input, InputSender};

/// Schedules one-shot timeouts tagged with a session.
pub trait Timer: Send {
    /// Deliver [`Input::Timeout`] for `session` after `after`.
    fn schedule(&mut self, session: SessionId, after: Duration, events: InputSender);

    /// Drop the pending timeout of `session`. Unknown sessions are ignored.
    fn cancel(&mut self, session: SessionId);
}

/// Timer backed by `tokio::time::sleep` tasks.
#[derive(Debug, Default)]
pub struct TokioTimer {
    pending: HashMap<SessionId, JoinHandle<()>>,
}

impl TokioTimer {
    /// Create a timer with nothing scheduled.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for TokioTimer {
    fn schedule(&mut self, session: SessionId, after: Duration, events: InputSender) {
        self.pending.retain(|_, handle| !handle.is_finished());

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(Input::Timeout(session));
        });

        if let Some(previous) = self.pending.insert(session, handle) {
            previous.abort();
        }
    }

    fn cancel(&mut self, session: SessionId) {
        if let Some(handle) = self.pending.remove(&session) {
            debug!("Cancelling idle timer of {}", session);
            handle.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}
