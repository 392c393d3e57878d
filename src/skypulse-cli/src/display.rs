//! Line-oriented display of status and samples.

use std::io::{self, Write};

use skypulse_jetstream::{ObserverEvent, Status};

/// Keyboard command read from a stdin line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Connect or disconnect.
    Toggle,
    /// Close any session and exit.
    Quit,
    /// Anything else.
    Unknown,
}

/// Parse one line of input. An empty line toggles.
pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" | "t" | "toggle" => Command::Toggle,
        "q" | "quit" | "exit" => Command::Quit,
        _ => Command::Unknown,
    }
}

/// Writes observer events to a sink, one line each.
pub struct Display<W: Write> {
    out: W,
    status: Status,
    sample: Option<String>,
}

impl<W: Write> Display<W> {
    /// Display writing to `out`, starting disconnected with no sample.
    pub fn new(out: W) -> Self {
        Self {
            out,
            status: Status::Disconnected,
            sample: None,
        }
    }

    /// Last status shown.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Sample currently on display.
    pub fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    /// Render one event.
    pub fn apply(&mut self, event: &ObserverEvent) -> io::Result<()> {
        match event {
            ObserverEvent::Status(status) => {
                self.status = *status;
                writeln!(self.out, "[{status}]")?;
            }
            ObserverEvent::Sample(sample) => {
                self.sample = Some(sample.clone());
                writeln!(self.out, "  {sample}")?;
            }
            // Nothing on screen to erase in a scrolling terminal.
            ObserverEvent::Clear => self.sample = None,
        }
        self.out.flush()
    }

    /// Print the key bindings.
    pub fn hint(&mut self) -> io::Result<()> {
        writeln!(self.out, "Enter toggles, q quits.")?;
        self.out.flush()
    }

    /// Give back the sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("\n"), Command::Toggle);
        assert_eq!(parse_command(""), Command::Toggle);
        assert_eq!(parse_command(" q "), Command::Quit);
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("hello"), Command::Unknown);
    }

    #[test]
    fn test_display_session_lifecycle() {
        let mut display = Display::new(Vec::new());
        for event in [
            ObserverEvent::Status(Status::Connecting),
            ObserverEvent::Status(Status::Connected),
            ObserverEvent::Sample("hello".to_string()),
            ObserverEvent::Sample("world".to_string()),
        ] {
            display.apply(&event).unwrap();
        }
        assert_eq!(display.status(), Status::Connected);
        assert_eq!(display.sample(), Some("world"));

        display
            .apply(&ObserverEvent::Status(Status::Disconnected))
            .unwrap();
        display.apply(&ObserverEvent::Clear).unwrap();
        assert_eq!(display.sample(), None);
        display.hint().unwrap();

        let output = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(
            output,
            "[connecting]\n[connected]\n  hello\n  world\n[disconnected]\nEnter toggles, q quits.\n"
        );
    }
}
