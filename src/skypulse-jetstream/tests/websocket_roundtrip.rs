//! Runner against a real WebSocket server on loopback.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use skypulse_jetstream::{
    ChannelDiagnostics, ChannelObserver, Fault, JetstreamConfig, ObserverEvent, Runner,
    RunnerHandle, Status,
};

const HELLO_WORLD: &str = r#"{"did":"did:plc:abc","time_us":1725911162329308,"kind":"commit","commit":{"rev":"3l3qo2vutsw2b","operation":"create","collection":"app.bsky.feed.post","rkey":"3l3qo2vuowo2b","record":{"$type":"app.bsky.feed.post","createdAt":"2024-09-09T19:46:02.102Z","text":"hello world"}}}"#;

/// How the test server ends the connection.
#[derive(Debug, Clone, Copy)]
enum Ending {
    /// Keep reading until the client closes.
    WaitForClient,
    /// Drop the TCP stream without a close frame.
    Drop,
}

/// Accept one connection, send `frames`, then end as told. Resolves to the
/// request URI the client asked for.
async fn serve_once(
    listener: TcpListener,
    frames: Vec<&'static str>,
    ending: Ending,
) -> oneshot::Receiver<String> {
    let (uri_tx, uri_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| {
            let _ = uri_tx.send(req.uri().to_string());
            Ok::<_, ErrorResponse>(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }

        match ending {
            Ending::WaitForClient => while let Some(Ok(_)) = ws.next().await {},
            Ending::Drop => drop(ws),
        }
    });

    uri_rx
}

struct Client {
    handle: RunnerHandle,
    observed: mpsc::UnboundedReceiver<ObserverEvent>,
    faults: mpsc::UnboundedReceiver<Fault>,
}

impl Client {
    fn start(port: u16) -> Self {
        let config = JetstreamConfig {
            endpoints: vec![format!("127.0.0.1:{port}")],
            tls: false,
            seed: Some(7),
            close_timeout_secs: 2,
            ..Default::default()
        };
        let (observer, observed) = ChannelObserver::channel();
        let (diagnostics, faults) = ChannelDiagnostics::channel();
        let runner = Runner::from_config(&config, observer)
            .unwrap()
            .with_diagnostics(diagnostics);
        let handle = runner.handle();
        tokio::spawn(runner.run());

        Self {
            handle,
            observed,
            faults,
        }
    }

    async fn next_event(&mut self) -> ObserverEvent {
        tokio::time::timeout(Duration::from_secs(10), self.observed.recv())
            .await
            .expect("observer event")
            .expect("observer channel open")
    }

    async fn next_fault(&mut self) -> Fault {
        tokio::time::timeout(Duration::from_secs(10), self.faults.recv())
            .await
            .expect("fault")
            .expect("diagnostics channel open")
    }
}

#[tokio::test]
async fn test_stream_sample_then_graceful_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let uri = serve_once(listener, vec![HELLO_WORLD], Ending::WaitForClient).await;

    let mut client = Client::start(port);
    assert!(client.handle.toggle());

    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Connecting)
    );
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Connected)
    );
    match client.next_event().await {
        ObserverEvent::Sample(sample) => assert!(sample == "hello" || sample == "world"),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        uri.await.unwrap(),
        "/subscribe?wantedCollections=app.bsky.feed.post"
    );

    assert!(client.handle.toggle());
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Disconnecting)
    );
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Disconnected)
    );
    assert_eq!(client.next_event().await, ObserverEvent::Clear);
    assert!(client.faults.try_recv().is_err());
}

#[tokio::test]
async fn test_server_drop_reports_fault() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _uri = serve_once(listener, Vec::new(), Ending::Drop).await;

    let mut client = Client::start(port);
    assert!(client.handle.toggle());

    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Connecting)
    );
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Connected)
    );

    let fault = client.next_fault().await;
    assert!(matches!(fault, Fault::Transport { ref endpoint, .. } if *endpoint == format!("127.0.0.1:{port}")));

    // Straight to disconnected; no close was requested by the user.
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Disconnected)
    );
    assert_eq!(client.next_event().await, ObserverEvent::Clear);
}

#[tokio::test]
async fn test_refused_connection_ends_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = Client::start(port);
    assert!(client.handle.toggle());

    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Connecting)
    );
    assert!(matches!(client.next_fault().await, Fault::Transport { .. }));
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Disconnected)
    );
    assert_eq!(client.next_event().await, ObserverEvent::Clear);

    // The user can try again.
    assert!(client.handle.toggle());
    assert_eq!(
        client.next_event().await,
        ObserverEvent::Status(Status::Connecting)
    );
}
