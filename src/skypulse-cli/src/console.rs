//! Interactive loop tying stdin, the runner and the display together.

use std::io::{self, Write};

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skypulse_jetstream::{ConnectionState, ObserverEvent, RunnerHandle};

use crate::display::{Command, Display, parse_command};

/// Drives a running client from line input and renders what it reports.
///
/// Input and output failures never abort the loop: they stop that side and
/// shut the client down, so a live session is still closed before
/// [`run`](Self::run) returns.
pub struct Console<W: Write> {
    display: Display<W>,
    handle: RunnerHandle,
    output_open: bool,
}

impl<W: Write> Console<W> {
    /// Console rendering to `display` and controlling the client behind `handle`.
    pub fn new(display: Display<W>, handle: RunnerHandle) -> Self {
        Self {
            display,
            handle,
            output_open: true,
        }
    }

    /// Run until the client task finishes. Returns the client's final state.
    pub async fn run<R>(
        &mut self,
        input: R,
        mut events: mpsc::UnboundedReceiver<ObserverEvent>,
        mut client: JoinHandle<ConnectionState>,
    ) -> anyhow::Result<ConnectionState>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;

        let result = self.display.hint();
        self.check_output(result);

        let state = loop {
            tokio::select! {
                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) => self.command(parse_command(&line)),
                    Ok(None) => {
                        debug!("Input closed");
                        input_open = false;
                        self.handle.shutdown();
                    }
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        input_open = false;
                        self.handle.shutdown();
                    }
                },
                Some(event) = events.recv() => self.render(&event),
                state = &mut client => break state.context("client task failed")?,
            }
        };

        // Anything the client reported while stopping.
        while let Ok(event) = events.try_recv() {
            self.render(&event);
        }

        Ok(state)
    }

    /// The display, with everything rendered so far.
    pub fn display(&self) -> &Display<W> {
        &self.display
    }

    fn command(&mut self, command: Command) {
        match command {
            Command::Toggle => {
                self.handle.toggle();
            }
            Command::Quit => {
                self.handle.shutdown();
            }
            Command::Unknown => {
                let result = self.display.hint();
                self.check_output(result);
            }
        }
    }

    fn render(&mut self, event: &ObserverEvent) {
        let result = self.display.apply(event);
        self.check_output(result);
    }

    fn check_output(&mut self, result: io::Result<()>) {
        match result {
            Err(e) if self.output_open => {
                warn!("Failed to write output, shutting down: {}", e);
                self.output_open = false;
                self.handle.shutdown();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::sync::oneshot;
    use url::Url;

    use skypulse_jetstream::{
        ChannelObserver, Connector, Input, InputSender, JetstreamConfig, Runner, SessionId, Status,
        TransportHandle,
    };

    use super::*;

    /// Opens at once and closes as soon as a close is requested.
    struct LoopbackConnector;

    impl Connector for LoopbackConnector {
        fn open(&mut self, session: SessionId, _url: &Url, events: InputSender) -> TransportHandle {
            let (close_tx, close_rx) = oneshot::channel();
            let task = tokio::spawn(async move {
                let _ = events.send(Input::Opened(session));
                let _ = close_rx.await;
                let _ = events.send(Input::Closed(session));
            });
            TransportHandle::new(close_tx).with_task(task)
        }
    }

    /// Writer whose reader goes away after the first flushed line.
    #[derive(Default)]
    struct ClosingPipe {
        flushed: bool,
    }

    impl Write for ClosingPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.flushed {
                Err(io::ErrorKind::BrokenPipe.into())
            } else {
                Ok(buf.len())
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    fn start() -> (
        RunnerHandle,
        mpsc::UnboundedReceiver<ObserverEvent>,
        JoinHandle<ConnectionState>,
    ) {
        let (observer, events) = ChannelObserver::channel();
        let runner = Runner::from_config(&JetstreamConfig::default(), observer)
            .unwrap()
            .with_connector(LoopbackConnector);
        let handle = runner.handle();
        (handle, events, tokio::spawn(runner.run()))
    }

    async fn run_console<W: Write>(
        console: &mut Console<W>,
        input: impl AsyncBufRead + Unpin,
        events: mpsc::UnboundedReceiver<ObserverEvent>,
        client: JoinHandle<ConnectionState>,
    ) -> ConnectionState {
        tokio::time::timeout(Duration::from_secs(10), console.run(input, events, client))
            .await
            .expect("console finished")
            .unwrap()
    }

    #[tokio::test]
    async fn test_quit_closes_live_session() {
        let (handle, events, client) = start();
        let mut console = Console::new(Display::new(Vec::new()), handle);
        let (mut keys, input) = tokio::io::duplex(64);
        keys.write_all(b"\n").await.unwrap();

        let run = run_console(&mut console, BufReader::new(input), events, client);
        let typist = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            keys.write_all(b"q\n").await.unwrap();
        };
        let (state, ()) = tokio::join!(run, typist);

        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(console.display().sample(), None);
        assert_eq!(console.display().status(), Status::Disconnected);
    }

    #[tokio::test]
    async fn test_unreadable_input_still_closes_session() {
        let (handle, events, client) = start();
        let mut console = Console::new(Display::new(Vec::new()), handle);

        // Toggle, then a line that is not UTF-8.
        let input: &[u8] = b"\n\xff\xfe\n";
        let state = run_console(&mut console, BufReader::new(input), events, client).await;

        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(console.display().status(), Status::Disconnected);
    }

    #[tokio::test]
    async fn test_broken_output_still_closes_session() {
        let (handle, events, client) = start();
        let mut console = Console::new(Display::new(ClosingPipe::default()), handle);
        let (mut keys, input) = tokio::io::duplex(64);
        keys.write_all(b"\n").await.unwrap();

        // Input stays open; only the failed status write stops the client.
        let state = run_console(&mut console, BufReader::new(input), events, client).await;
        assert_eq!(state, ConnectionState::Closed);
        drop(keys);
    }

    #[tokio::test]
    async fn test_end_of_input_when_idle_stops_client() {
        let (handle, events, client) = start();
        let mut console = Console::new(Display::new(Vec::new()), handle);

        let input: &[u8] = b"";
        let state = run_console(&mut console, BufReader::new(input), events, client).await;
        assert_eq!(state, ConnectionState::Idle);
    }
}
