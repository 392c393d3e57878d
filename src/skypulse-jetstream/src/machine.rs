//! Connection lifecycle state machine.
//!
//! The machine owns the single [`Session`] and decides, for every input, the
//! next state and the list of [`Effect`]s the caller must carry out. It never
//! touches a socket or a clock itself, which keeps every transition testable
//! without a transport.
//!
//! | From               | Input                 | To         |
//! |--------------------|-----------------------|------------|
//! | Idle, Closed       | toggle                | Connecting |
//! | Connecting         | transport open        | Open       |
//! | Connecting, Open   | toggle, idle timeout  | Closing    |
//! | Closing            | toggle, idle timeout  | Closing    |
//! | live               | transport error       | unchanged, transport force-closed |
//! | live               | transport close       | Closed     |
//!
//! Every session gets a fresh [`SessionId`]. Transport events and timer
//! expiries are tagged with the id they were created for and are ignored once
//! that session is no longer current, so a timer armed for an old session can
//! never close a newer one.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::JetstreamConfig;
use crate::endpoints::EndpointPool;
use crate::error::{Fault, JetstreamResult};
use crate::events::{EventFilter, FilterOutcome, SampleToken};
use crate::random::RandomSource;

/// Identifier of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session has been started yet.
    Idle,
    /// Transport open requested, not yet confirmed.
    Connecting,
    /// Transport confirmed open.
    Open,
    /// Close requested, waiting for the transport to confirm.
    Closing,
    /// Last session ended.
    Closed,
}

impl ConnectionState {
    /// Whether a session is attached in this state.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        )
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status shown to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// A connection attempt started.
    Connecting,
    /// The transport is open.
    Connected,
    /// A close was requested.
    Disconnecting,
    /// The session ended.
    Disconnected,
}

impl Status {
    /// Status text as displayed.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Connecting => "connecting",
            Status::Connected => "connected",
            Status::Disconnecting => "disconnecting",
            Status::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Endpoint host chosen for this session.
    pub endpoint: String,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a transport for `session` against `url`.
    OpenTransport {
        /// Session the transport belongs to.
        session: SessionId,
        /// Subscription URL.
        url: Url,
    },
    /// Close the transport of `session`. Closing an absent or already closed
    /// transport does nothing.
    CloseTransport {
        /// Session whose transport to close.
        session: SessionId,
    },
    /// Deliver a timeout for `session` after `after`.
    ArmIdleTimer {
        /// Session the timer belongs to.
        session: SessionId,
        /// Delay before expiry.
        after: Duration,
    },
    /// Drop the pending timer of `session`, if any.
    CancelIdleTimer {
        /// Session whose timer to drop.
        session: SessionId,
    },
    /// Push a status to the observer.
    Notify(Status),
    /// Push a sample token to the observer.
    ShowSample(SampleToken),
    /// Clear the displayed sample.
    ClearSample,
    /// Report a fault to diagnostics.
    Report(Fault),
}

/// Per-session frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames handed to the filter.
    pub frames: u64,
    /// Frames that produced a sample.
    pub samples: u64,
    /// Empty frames.
    pub empty: u64,
    /// Frames that were not JSON.
    pub malformed: u64,
    /// JSON frames that were not create commits with text.
    pub irrelevant: u64,
}

impl FrameStats {
    fn record(&mut self, outcome: &FilterOutcome) {
        self.frames += 1;
        match outcome {
            FilterOutcome::Empty => self.empty += 1,
            FilterOutcome::Malformed => self.malformed += 1,
            FilterOutcome::Irrelevant => self.irrelevant += 1,
            FilterOutcome::Sample(_) => self.samples += 1,
        }
    }
}

/// Connection manager state machine.
#[derive(Debug)]
pub struct ConnectionMachine {
    pool: EndpointPool,
    filter: EventFilter,
    idle_timeout: Duration,
    state: ConnectionState,
    session: Option<Session>,
    last_session: u64,
    stats: FrameStats,
}

impl ConnectionMachine {
    /// Create an idle machine.
    pub fn new(pool: EndpointPool, filter: EventFilter, idle_timeout: Duration) -> Self {
        Self {
            pool,
            filter,
            idle_timeout,
            state: ConnectionState::Idle,
            session: None,
            last_session: 0,
            stats: FrameStats::default(),
        }
    }

    /// Create an idle machine from a validated configuration.
    pub fn from_config(config: &JetstreamConfig) -> JetstreamResult<Self> {
        config.validate()?;
        let filter = EventFilter::new(config.sample_len).with_hashtags(&config.hashtags);
        Ok(Self::new(config.endpoint_pool()?, filter, config.idle_timeout()))
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current session, if one is live.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Counters of the current (or last) session.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Endpoint pool.
    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Connect from `Idle`/`Closed`, disconnect from `Connecting`/`Open`,
    /// nothing from `Closing`.
    pub fn toggle(&mut self, rng: &mut dyn RandomSource) -> Vec<Effect> {
        match self.state {
            ConnectionState::Idle | ConnectionState::Closed => {
                if self.session.is_some() {
                    return vec![self.inconsistent("toggle")];
                }
                self.connect(rng)
            }
            ConnectionState::Connecting | ConnectionState::Open => {
                let Some(session) = self.session.as_ref().map(|s| s.id) else {
                    return vec![self.inconsistent("toggle")];
                };
                self.begin_close(session)
            }
            ConnectionState::Closing => {
                debug!("Toggle ignored while closing");
                Vec::new()
            }
        }
    }

    /// Transport confirmed open.
    pub fn handle_open(&mut self, session: SessionId) -> Vec<Effect> {
        if !self.is_current(session) {
            debug!("Ignoring open for stale {}", session);
            return Vec::new();
        }

        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Open;
                info!("Connected ({})", session);
                vec![Effect::Notify(Status::Connected)]
            }
            ConnectionState::Closing => {
                debug!("{} opened after close was requested", session);
                Vec::new()
            }
            state => vec![self.fault(state, "transport open")],
        }
    }

    /// Inbound frame for `session`.
    pub fn handle_message(
        &mut self,
        session: SessionId,
        frame: Option<&str>,
        rng: &mut dyn RandomSource,
    ) -> Vec<Effect> {
        if !self.is_current(session) {
            return Vec::new();
        }

        let outcome = self.filter.classify(frame, rng);
        self.stats.record(&outcome);

        match outcome {
            FilterOutcome::Sample(token) => vec![Effect::ShowSample(token)],
            _ => Vec::new(),
        }
    }

    /// Transport failed. The transport is force-closed; its close event
    /// completes the transition to `Closed`.
    pub fn handle_error(&mut self, session: SessionId, message: impl Into<String>) -> Vec<Effect> {
        let message = message.into();
        let Some(current) = self.session.as_ref().filter(|s| s.id == session) else {
            debug!("Ignoring error for stale {}: {}", session, message);
            return Vec::new();
        };

        warn!("Transport error on {}: {}", session, message);
        let fault = Fault::Transport {
            session,
            endpoint: current.endpoint.clone(),
            message,
        };
        vec![Effect::CloseTransport { session }, Effect::Report(fault)]
    }

    /// Transport closed.
    pub fn handle_close(&mut self, session: SessionId) -> Vec<Effect> {
        if !self.is_current(session) {
            debug!("Ignoring close for stale {}", session);
            return Vec::new();
        }

        self.state = ConnectionState::Closed;
        self.session = None;

        let stats = self.stats;
        info!(
            frames = stats.frames,
            samples = stats.samples,
            empty = stats.empty,
            malformed = stats.malformed,
            irrelevant = stats.irrelevant,
            "Disconnected ({})",
            session
        );

        vec![
            Effect::CancelIdleTimer { session },
            Effect::Notify(Status::Disconnected),
            Effect::ClearSample,
        ]
    }

    /// Idle timer of `session` expired.
    pub fn handle_timeout(&mut self, session: SessionId) -> Vec<Effect> {
        if !self.is_current(session) {
            debug!("Ignoring idle timeout for stale {}", session);
            return Vec::new();
        }

        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                info!("Idle timeout reached for {}", session);
                self.begin_close(session)
            }
            ConnectionState::Closing => Vec::new(),
            state => vec![self.fault(state, "idle timeout")],
        }
    }

    fn connect(&mut self, rng: &mut dyn RandomSource) -> Vec<Effect> {
        let endpoint = self.pool.choose(rng).clone();
        self.last_session += 1;
        let id = SessionId(self.last_session);

        info!("Connecting to {} ({})", endpoint.host(), id);

        self.state = ConnectionState::Connecting;
        self.stats = FrameStats::default();
        self.session = Some(Session {
            id,
            endpoint: endpoint.host().to_string(),
        });

        vec![
            Effect::OpenTransport {
                session: id,
                url: endpoint.url().clone(),
            },
            Effect::ArmIdleTimer {
                session: id,
                after: self.idle_timeout,
            },
            Effect::Notify(Status::Connecting),
        ]
    }

    fn begin_close(&mut self, session: SessionId) -> Vec<Effect> {
        debug!("Closing {}", session);
        self.state = ConnectionState::Closing;
        vec![
            Effect::CloseTransport { session },
            Effect::Notify(Status::Disconnecting),
        ]
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }

    fn inconsistent(&self, context: &'static str) -> Effect {
        self.fault(self.state, context)
    }

    fn fault(&self, state: ConnectionState, context: &'static str) -> Effect {
        Effect::Report(Fault::InconsistentState { state, context })
    }
}
