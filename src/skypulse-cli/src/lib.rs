//! Skypulse CLI.
//!
//! Terminal front end for the Jetstream client: argument parsing, logging
//! setup and the line-oriented display of status and samples.

pub mod args;
pub mod console;
pub mod display;
pub mod logging;

pub use args::Args;
pub use console::Console;
pub use display::{Command, Display, parse_command};
pub use logging::setup_logging;
