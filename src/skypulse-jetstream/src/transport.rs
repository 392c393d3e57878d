//! WebSocket transport for a Jetstream session.
//!
//! A transport is a task that opens the socket, forwards text frames and
//! reports lifecycle events as [`Input`]s tagged with its session. Whatever
//! happens (refused connection, read error, close requested by either side)
//! the task emits exactly one [`Input::Closed`] as its last event. This core
//! never sends application data on the socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use crate::machine::SessionId;
use crate::runner::{Input, InputSender};

/// Control handle of one open (or opening) transport.
#[derive(Debug)]
pub struct TransportHandle {
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    /// Handle that requests close through `close_tx`.
    pub fn new(close_tx: oneshot::Sender<()>) -> Self {
        Self {
            close_tx: Some(close_tx),
            task: None,
        }
    }

    /// Attach the task driving the transport; it is aborted when the handle
    /// is dropped.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Request a close. Repeated requests do nothing.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens transports for sessions.
pub trait Connector: Send {
    /// Start a transport for `session` against `url`, reporting to `events`.
    fn open(&mut self, session: SessionId, url: &Url, events: InputSender) -> TransportHandle;
}

/// Connector over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    close_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl WebSocketConnector {
    /// Connector that forces a close when the handshake takes longer than
    /// `close_timeout`.
    pub fn new(close_timeout: Duration) -> Self {
        Self { close_timeout }
    }
}

impl Connector for WebSocketConnector {
    fn open(&mut self, session: SessionId, url: &Url, events: InputSender) -> TransportHandle {
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_socket(
            session,
            url.clone(),
            close_rx,
            events,
            self.close_timeout,
        ));
        TransportHandle::new(close_tx).with_task(task)
    }
}

async fn run_socket(
    session: SessionId,
    url: Url,
    mut close_rx: oneshot::Receiver<()>,
    events: InputSender,
    close_timeout: Duration,
) {
    debug!("Opening WebSocket for {}: {}", session, url);

    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                let _ = events.send(Input::Error(session, e.to_string()));
                let _ = events.send(Input::Closed(session));
                return;
            }
        },
        _ = &mut close_rx => {
            debug!("Close requested before {} finished connecting", session);
            let _ = events.send(Input::Closed(session));
            return;
        }
    };

    let _ = events.send(Input::Opened(session));

    let (mut write, mut read) = ws_stream.split();
    let mut close_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut close_rx, if close_deadline.is_none() => {
                close_deadline = Some(Instant::now() + close_timeout);
                if let Err(e) = write.send(WsMessage::Close(None)).await {
                    debug!("Close frame for {} not sent: {}", session, e);
                    break;
                }
            }
            _ = tokio::time::sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                warn!("Close handshake for {} timed out, dropping connection", session);
                break;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = events.send(Input::Frame(session, text));
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        debug!("Ignoring {} byte binary frame on {}", data.len(), session);
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!("WebSocket closed by server ({}): {:?}", session, frame);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if close_deadline.is_none() {
                            let _ = events.send(Input::Error(session, e.to_string()));
                        } else {
                            debug!("Read error while closing {}: {}", session, e);
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = events.send(Input::Closed(session));
}
