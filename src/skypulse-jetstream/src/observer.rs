//! Observer and diagnostics sinks.

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::error::Fault;
use crate::events::SampleToken;
use crate::machine::Status;

/// Receives status changes and samples for display.
pub trait Observer: Send {
    /// Lifecycle status changed.
    fn on_status(&mut self, status: Status);

    /// A new sample replaces the displayed one.
    fn on_sample(&mut self, sample: &SampleToken);

    /// The displayed sample should be cleared.
    fn on_clear(&mut self);
}

/// Receives faults. Reporting is best-effort and never fails back.
pub trait Diagnostics: Send {
    /// Record a fault.
    fn report(&mut self, fault: &Fault);
}

/// Everything an observer can be told, as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    /// Status update.
    Status(Status),
    /// Sample token.
    Sample(String),
    /// Clear the sample.
    Clear,
}

/// Observer forwarding every notification into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl ChannelObserver {
    /// Observer plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn on_status(&mut self, status: Status) {
        let _ = self.tx.send(ObserverEvent::Status(status));
    }

    fn on_sample(&mut self, sample: &SampleToken) {
        let _ = self.tx.send(ObserverEvent::Sample(sample.as_str().to_string()));
    }

    fn on_clear(&mut self) {
        let _ = self.tx.send(ObserverEvent::Clear);
    }
}

/// Diagnostics sink that logs faults through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&mut self, fault: &Fault) {
        match fault {
            Fault::Transport { .. } => warn!("{}", fault),
            Fault::InconsistentState { .. } => error!("Logic error: {}", fault),
        }
    }
}

/// Diagnostics sink forwarding faults into a channel.
#[derive(Debug, Clone)]
pub struct ChannelDiagnostics {
    tx: mpsc::UnboundedSender<Fault>,
}

impl ChannelDiagnostics {
    /// Sink plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Fault>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Diagnostics for ChannelDiagnostics {
    fn report(&mut self, fault: &Fault) {
        let _ = self.tx.send(fault.clone());
    }
}
