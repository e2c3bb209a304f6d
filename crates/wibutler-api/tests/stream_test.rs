#![allow(clippy::unwrap_used)]
// Integration tests for `RealtimeChannel` against a local WebSocket server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::SinkExt;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

use wibutler_api::{
    Credentials, DeviceDelta, Endpoint, Error, HubSession, RealtimeChannel, ReconnectConfig,
    StreamState,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn session_for(addr: SocketAddr, token: Option<&str>) -> Arc<HubSession> {
    let endpoint = Endpoint::new(&addr.ip().to_string(), addr.port(), false).unwrap();
    let credentials = Credentials::new("admin", SecretString::from("pw".to_string()));
    let session = HubSession::with_client(reqwest::Client::new(), endpoint, credentials);
    let session = match token {
        Some(t) => session.with_token(SecretString::from(t.to_string())),
        None => session,
    };
    Arc::new(session)
}

fn frame(device_id: &str, name: &str, value: &str) -> Message {
    Message::text(format!(
        r#"{{"data":{{"id":"{device_id}","components":[{{"name":"{name}","value":"{value}"}}]}}}}"#
    ))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<DeviceDelta>>);

impl Recorder {
    fn ids(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.device_id.clone())
            .collect()
    }
}

impl wibutler_api::DeltaSink for Recorder {
    fn deliver(&self, delta: &DeviceDelta) {
        self.0.lock().unwrap().push(delta.clone());
    }
}

/// Accept one client, record the request path, send `frames`, then close.
async fn serve_once(listener: TcpListener, frames: Vec<Message>) -> String {
    let (stream, _) = listener.accept().await.unwrap();
    let seen_path = Arc::new(Mutex::new(String::new()));
    let record = Arc::clone(&seen_path);
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *record.lock().unwrap() = req.uri().path().to_owned();
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .unwrap();

    for msg in frames {
        ws.send(msg).await.unwrap();
    }
    let _ = ws.close(None).await;
    seen_path.lock().unwrap().clone()
}

// ── Streaming ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_delivers_deltas_and_skips_malformed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(serve_once(
        listener,
        vec![
            Message::text("{this is not json"),
            frame("A", "TMP", "2150"),
            Message::text(r#"{"event":"heartbeat"}"#),
            frame("B", "SWT", "ON"),
        ],
    ));

    let channel = RealtimeChannel::new(session_for(addr, Some("tok-abc")), ReconnectConfig::default());
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();

    channel.run(&recorder, &cancel).await.unwrap();

    assert_eq!(server.await.unwrap(), "/api/stream/tok-abc");
    assert_eq!(recorder.ids(), vec!["A".to_owned(), "B".to_owned()]);
    let first = &recorder.0.lock().unwrap()[0];
    assert_eq!(first.components[0].name, "TMP");
    assert_eq!(first.components[0].value, "2150");
    assert_eq!(channel.current_state(), StreamState::Stopped);
}

#[tokio::test]
async fn test_stream_requires_token() {
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let channel = RealtimeChannel::new(session_for(addr, None), ReconnectConfig::default());
    let recorder = Recorder::default();

    let result = channel.connect_and_stream(&recorder, &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::MissingToken)), "got: {result:?}");
    assert_eq!(channel.current_state(), StreamState::Failed);
}

#[tokio::test]
async fn test_connection_failure_ends_stream_without_reconnect() {
    // Bind and drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let channel = RealtimeChannel::new(session_for(addr, Some("tok")), ReconnectConfig::default());
    let recorder = Recorder::default();

    let result = channel.run(&recorder, &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::WebSocketConnect(_))), "got: {result:?}");
    assert_eq!(channel.current_state(), StreamState::Failed);
}

#[tokio::test]
async fn test_cancel_stops_idle_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Server accepts and then stays silent.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(ws);
    });

    let channel = RealtimeChannel::new(session_for(addr, Some("tok")), ReconnectConfig::default());
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(3), channel.run(&recorder, &cancel))
        .await
        .expect("cancellation did not stop the stream");

    assert!(result.is_ok());
    assert_eq!(channel.current_state(), StreamState::Stopped);
    server.abort();
}

// ── Reconnection ────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_gives_up_after_max_retries() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let reconnect = ReconnectConfig {
        enabled: true,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_retries: Some(2),
    };
    let channel = RealtimeChannel::new(session_for(addr, Some("tok")), reconnect);
    let recorder = Recorder::default();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        channel.run(&recorder, &CancellationToken::new()),
    )
    .await
    .unwrap();

    assert!(result.is_err());
    assert_eq!(channel.current_state(), StreamState::Failed);
}

#[tokio::test]
async fn test_reconnect_after_clean_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (first, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(first).await.unwrap();
        ws.send(frame("A", "STATE", "1")).await.unwrap();
        let _ = ws.close(None).await;

        let (second, _) = listener.accept().await.unwrap();
        // Nobody listens after this one, so the next reconnect fails.
        drop(listener);
        let mut ws = tokio_tungstenite::accept_async(second).await.unwrap();
        ws.send(frame("B", "STATE", "0")).await.unwrap();
        let _ = ws.close(None).await;
    });

    let reconnect = ReconnectConfig {
        enabled: true,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        max_retries: Some(0),
    };
    let channel = RealtimeChannel::new(session_for(addr, Some("tok")), reconnect);
    let recorder = Recorder::default();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        channel.run(&recorder, &CancellationToken::new()),
    )
    .await
    .unwrap();

    server.await.unwrap();
    assert!(result.is_err());
    assert_eq!(recorder.ids(), vec!["A".to_owned(), "B".to_owned()]);
}
