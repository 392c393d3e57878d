//! Error types for the Jetstream client.
//!
//! `JetstreamError` covers failures the caller can act on (bad configuration,
//! unreadable config files, unusable endpoints). Faults that happen while a
//! session is live never surface as errors; they are delivered to the
//! diagnostics sink as a [`Fault`] instead.

use std::fmt;

use thiserror::Error;

use crate::machine::{ConnectionState, SessionId};

/// Errors that can occur while setting up the Jetstream client.
#[derive(Error, Debug)]
pub enum JetstreamError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint does not form a valid subscription URL.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending endpoint host.
        endpoint: String,
        /// Why the URL could not be built.
        reason: String,
    },

    /// TOML config parse error.
    #[error("TOML error: {0}")]
    Toml(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for JetstreamError {
    fn from(err: toml::de::Error) -> Self {
        JetstreamError::Toml(err.to_string())
    }
}

/// Result type for Jetstream operations.
pub type JetstreamResult<T> = std::result::Result<T, JetstreamError>;

/// A fault reported to the diagnostics sink.
///
/// Malformed or irrelevant frames are expected traffic and never become a
/// fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The transport of a live session failed. The session is closed, not
    /// retried.
    Transport {
        /// Session whose transport failed.
        session: SessionId,
        /// Endpoint the session was connected to.
        endpoint: String,
        /// Transport error description.
        message: String,
    },

    /// The machine found itself in a state that its session bookkeeping
    /// contradicts. No action is taken.
    InconsistentState {
        /// State at the time of the event.
        state: ConnectionState,
        /// What was being handled.
        context: &'static str,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Transport {
                session,
                endpoint,
                message,
            } => write!(f, "transport error on {session} ({endpoint}): {message}"),
            Fault::InconsistentState { state, context } => {
                write!(f, "inconsistent state {state} while handling {context}")
            }
        }
    }
}
