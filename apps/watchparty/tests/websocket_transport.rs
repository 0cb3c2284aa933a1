use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;
use watchparty_client_core::proto::{InboundCommand, OutboundIntent, SessionId};
use watchparty_client_core::transport::{TransportEvent, WebSocketTransport};

#[derive(Default)]
struct Authority {
    connections: AtomicUsize,
    received: AsyncMutex<Vec<Value>>,
}

async fn spawn_authority() -> (SocketAddr, Arc<Authority>) {
    let state = Arc::new(Authority::default());
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    (addr, state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<Authority>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Minimal authority: assigns `sid-N`, answers `request_sync` (after a junk
/// frame), and hangs up when it sees a `seek`.
async fn handle_socket(mut socket: WebSocket, state: Arc<Authority>) {
    let n = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let hello = json!({"event": "connect", "data": {"sid": format!("sid-{n}")}});
    if socket.send(WsMessage::Text(hello.to_string())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        state.received.lock().await.push(value.clone());
        match value["event"].as_str() {
            Some("request_sync") => {
                let _ = socket.send(WsMessage::Text("not json".into())).await;
                let _ = socket
                    .send(WsMessage::Text(
                        json!({"event": "chat", "data": {"text": "hi"}}).to_string(),
                    ))
                    .await;
                let snapshot = json!({
                    "event": "sync_state",
                    "data": {
                        "video_file_url": "/static/videos/a.mp4",
                        "current_time": "12.5",
                        "is_playing": "1",
                        "controller_sid": ""
                    }
                });
                let _ = socket.send(WsMessage::Text(snapshot.to_string())).await;
            }
            Some("seek") => {
                let _ = socket.send(WsMessage::Close(None)).await;
                return;
            }
            _ => {}
        }
    }
}

async fn next_event(events: &mut UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("transport event in time")
        .expect("transport still running")
}

#[tokio::test]
async fn transport_round_trips_and_reconnects() {
    let (addr, authority) = spawn_authority().await;
    let url = Url::parse(&format!("ws://{addr}/ws")).expect("url");
    let (transport, mut events) = WebSocketTransport::spawn(url, Duration::from_millis(50));

    assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Connected {
            sid: SessionId::from("sid-1")
        }
    );

    transport
        .send(OutboundIntent::RequestSync)
        .expect("queue request_sync");
    match next_event(&mut events).await {
        TransportEvent::Message(InboundCommand::Snapshot(snapshot)) => {
            assert_eq!(snapshot.source_url.as_deref(), Some("/static/videos/a.mp4"));
            assert_eq!(snapshot.position_seconds, 12.5);
            assert!(snapshot.is_playing);
            assert_eq!(snapshot.controller_id, None);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    transport
        .send(OutboundIntent::Seek { time: 3.0 })
        .expect("queue seek");
    assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
    assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Connected {
            sid: SessionId::from("sid-2")
        }
    );

    let received = authority.received.lock().await.clone();
    assert_eq!(received[0], json!({"event": "request_sync"}));
    assert_eq!(received[1], json!({"event": "seek", "data": {"time": 3.0}}));
}

#[tokio::test]
async fn unreachable_authority_reports_connect_error_and_retries() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws")).expect("url");
    let (_transport, mut events) = WebSocketTransport::spawn(url, Duration::from_millis(20));

    assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::ConnectError { .. }
    ));
    assert_eq!(next_event(&mut events).await, TransportEvent::Connecting);
}
