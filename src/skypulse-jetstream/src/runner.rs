//! Event loop driving the connection machine.
//!
//! Every input (user toggle, transport event, timer expiry) arrives on one
//! channel and is handled to completion before the next one is read, so the
//! machine never observes a half-applied transition. The runner carries out
//! the effects the machine returns against the injected connector, timer,
//! observer and diagnostics sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use skypulse_jetstream::{ChannelObserver, JetstreamConfig, Runner};
//!
//! let (observer, mut events) = ChannelObserver::channel();
//! let runner = Runner::from_config(&JetstreamConfig::default(), observer)?;
//! let handle = runner.handle();
//! tokio::spawn(runner.run());
//!
//! handle.toggle();
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::JetstreamConfig;
use crate::error::JetstreamResult;
use crate::machine::{ConnectionMachine, ConnectionState, Effect, FrameStats, SessionId};
use crate::observer::{Diagnostics, Observer, TracingDiagnostics};
use crate::random::{RandomSource, StdRandom};
use crate::timer::{Timer, TokioTimer};
use crate::transport::{Connector, TransportHandle, WebSocketConnector};

/// Input to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// User toggle.
    Toggle,
    /// Close any live session and stop.
    Shutdown,
    /// Transport of the session is open.
    Opened(SessionId),
    /// Text frame received on the session.
    Frame(SessionId, String),
    /// Transport of the session failed.
    Error(SessionId, String),
    /// Transport of the session is closed.
    Closed(SessionId),
    /// Idle timer of the session expired.
    Timeout(SessionId),
}

/// Sending half of the input channel.
pub type InputSender = mpsc::UnboundedSender<Input>;

/// Cloneable control handle for a running [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    tx: InputSender,
}

impl RunnerHandle {
    /// Toggle the connection. Returns false if the runner has stopped.
    pub fn toggle(&self) -> bool {
        self.tx.send(Input::Toggle).is_ok()
    }

    /// Ask the runner to close any live session and stop.
    pub fn shutdown(&self) -> bool {
        self.tx.send(Input::Shutdown).is_ok()
    }

    /// Inject a raw input.
    pub fn send(&self, input: Input) -> bool {
        self.tx.send(input).is_ok()
    }
}

/// Single-session Jetstream client.
pub struct Runner {
    machine: ConnectionMachine,
    rng: Box<dyn RandomSource>,
    connector: Box<dyn Connector>,
    timer: Box<dyn Timer>,
    observer: Box<dyn Observer>,
    diagnostics: Box<dyn Diagnostics>,
    transport: Option<(SessionId, TransportHandle)>,
    events_tx: InputSender,
    events_rx: mpsc::UnboundedReceiver<Input>,
    shutting_down: bool,
}

impl Runner {
    /// Runner with the WebSocket connector, a tokio timer, an OS-seeded
    /// random source and `tracing` diagnostics.
    pub fn new(machine: ConnectionMachine, observer: impl Observer + 'static) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            machine,
            rng: Box::new(StdRandom::from_os()),
            connector: Box::new(WebSocketConnector::default()),
            timer: Box::new(TokioTimer::new()),
            observer: Box::new(observer),
            diagnostics: Box::new(TracingDiagnostics),
            transport: None,
            events_tx,
            events_rx,
            shutting_down: false,
        }
    }

    /// Runner built from a configuration.
    pub fn from_config(
        config: &JetstreamConfig,
        observer: impl Observer + 'static,
    ) -> JetstreamResult<Self> {
        let machine = ConnectionMachine::from_config(config)?;
        Ok(Self::new(machine, observer)
            .with_rng(StdRandom::from_seed_opt(config.seed))
            .with_connector(WebSocketConnector::new(config.close_timeout())))
    }

    /// Replace the random source.
    pub fn with_rng(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the connector.
    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    /// Replace the timer.
    pub fn with_timer(mut self, timer: impl Timer + 'static) -> Self {
        self.timer = Box::new(timer);
        self
    }

    /// Replace the diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    /// Control handle.
    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            tx: self.events_tx.clone(),
        }
    }

    /// Current state of the machine.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Frame counters of the current (or last) session.
    pub fn stats(&self) -> FrameStats {
        self.machine.stats()
    }

    /// Process inputs until shutdown completes. Returns the final state.
    pub async fn run(mut self) -> ConnectionState {
        info!("Jetstream client ready");

        while let Some(input) = self.events_rx.recv().await {
            self.dispatch(input);
            if self.shutting_down && !self.machine.state().is_live() {
                break;
            }
        }

        info!("Jetstream client stopped");
        self.machine.state()
    }

    /// Handle one input to completion.
    pub fn dispatch(&mut self, input: Input) {
        let effects = match input {
            Input::Toggle if self.shutting_down => {
                debug!("Toggle ignored during shutdown");
                Vec::new()
            }
            Input::Toggle => self.machine.toggle(self.rng.as_mut()),
            Input::Shutdown => {
                self.shutting_down = true;
                match self.machine.state() {
                    ConnectionState::Connecting | ConnectionState::Open => {
                        self.machine.toggle(self.rng.as_mut())
                    }
                    _ => Vec::new(),
                }
            }
            Input::Opened(session) => self.machine.handle_open(session),
            Input::Frame(session, text) => {
                self.machine
                    .handle_message(session, Some(text.as_str()), self.rng.as_mut())
            }
            Input::Error(session, message) => self.machine.handle_error(session, message),
            Input::Closed(session) => {
                if self
                    .transport
                    .as_ref()
                    .is_some_and(|(current, _)| *current == session)
                {
                    self.transport = None;
                }
                self.machine.handle_close(session)
            }
            Input::Timeout(session) => self.machine.handle_timeout(session),
        };

        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport { session, url } => {
                if let Some((previous, mut handle)) = self.transport.take() {
                    debug!("Superseding transport of {}", previous);
                    handle.close();
                }
                let handle = self.connector.open(session, &url, self.events_tx.clone());
                self.transport = Some((session, handle));
            }
            Effect::CloseTransport { session } => {
                if let Some((current, handle)) = self.transport.as_mut() {
                    if *current == session {
                        handle.close();
                    }
                }
            }
            Effect::ArmIdleTimer { session, after } => {
                self.timer.schedule(session, after, self.events_tx.clone());
            }
            Effect::CancelIdleTimer { session } => self.timer.cancel(session),
            Effect::Notify(status) => self.observer.on_status(status),
            Effect::ShowSample(token) => self.observer.on_sample(&token),
            Effect::ClearSample => self.observer.on_clear(),
            Effect::Report(fault) => self.diagnostics.report(&fault),
        }
    }
}
