//! Jetstream firehose client.
//!
//! This crate connects to one of several interchangeable Jetstream endpoints,
//! keeps at most one streaming session alive, filters the inbound commit events
//! down to post creations and turns each accepted post into a short sample
//! token for display.
//!
//! # Architecture
//!
//! - [`ConnectionMachine`] holds the session lifecycle as an explicit state
//!   machine. Each input returns a list of [`Effect`]s instead of performing
//!   I/O.
//! - [`EventFilter`] decodes frames and draws sample tokens.
//! - [`Runner`] is the event loop: it feeds inputs to the machine one at a
//!   time and carries out the effects through injectable [`Connector`],
//!   [`Timer`], [`RandomSource`], [`Observer`] and [`Diagnostics`]
//!   implementations.
//!
//! Sessions are never retried. A transport error or the idle timeout ends the
//! session and a new toggle is required to reconnect.
//!
//! # Configuration
//!
//! See [`JetstreamConfig`]; files are TOML and `SKYPULSE_*` environment
//! variables override the defaults.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod machine;
pub mod observer;
pub mod random;
pub mod runner;
pub mod timer;
pub mod transport;

// Re-export main types
pub use config::JetstreamConfig;
pub use endpoints::{Endpoint, EndpointPool};
pub use error::{Fault, JetstreamError, JetstreamResult};
pub use events::{CommitEvent, EventFilter, FilterOutcome, SampleToken};
pub use machine::{
    ConnectionMachine, ConnectionState, Effect, FrameStats, Session, SessionId, Status,
};
pub use observer::{
    ChannelDiagnostics, ChannelObserver, Diagnostics, Observer, ObserverEvent, TracingDiagnostics,
};
pub use random::{RandomSource, SequenceRandom, StdRandom};
pub use runner::{Input, InputSender, Runner, RunnerHandle};
pub use timer::{Timer, TokioTimer};
pub use transport::{Connector, TransportHandle, WebSocketConnector};
