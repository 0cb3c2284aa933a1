use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;
use watchparty_proto::{OutboundIntent, ServerFrame, decode_server_frame, encode_intent};

use super::{TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client that keeps reconnecting until dropped.
pub struct WebSocketTransport {
    outbound: UnboundedSender<OutboundIntent>,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    /// Socket went away; reconnect after the delay.
    Dropped,
    /// Either side of the engine channel is gone; stop for good.
    Shutdown,
}

impl WebSocketTransport {
    /// Starts the connection loop on the current runtime. Events arrive on
    /// the returned receiver in order.
    pub fn spawn(url: Url, reconnect_delay: Duration) -> (Self, UnboundedReceiver<TransportEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            run_connection_loop(url, reconnect_delay, outbound_rx, events_tx).await;
        });
        (
            Self {
                outbound: outbound_tx,
                task: Some(task),
            },
            events_rx,
        )
    }

    /// Queues an intent for the live socket. Intents queued while
    /// disconnected are discarded on the next connect; the authority is
    /// re-polled instead.
    pub fn send(&self, intent: OutboundIntent) -> Result<(), TransportError> {
        self.outbound
            .send(intent)
            .map_err(|_| TransportError::Closed)
    }

    pub async fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn open(url: &Url) -> Result<WsStream, TransportError> {
    let (stream, _) = connect_async(url.as_str()).await?;
    Ok(stream)
}

async fn run_connection_loop(
    url: Url,
    reconnect_delay: Duration,
    mut outbound: UnboundedReceiver<OutboundIntent>,
    events: UnboundedSender<TransportEvent>,
) {
    loop {
        if events.send(TransportEvent::Connecting).is_err() {
            return;
        }
        debug!(url = %url, "opening websocket");
        match open(&url).await {
            Ok(stream) => {
                let mut stale = 0usize;
                while outbound.try_recv().is_ok() {
                    stale += 1;
                }
                if stale > 0 {
                    debug!(stale, "discarded intents queued while offline");
                }

                let exit = pump(stream, &mut outbound, &events).await;
                if events.send(TransportEvent::Disconnected).is_err() || exit == PumpExit::Shutdown {
                    return;
                }
            }
            Err(err) => {
                warn!(url = %url, error = %err, "websocket connect failed");
                let message = err.to_string();
                if events.send(TransportEvent::ConnectError { message }).is_err() {
                    return;
                }
            }
        }
        trace!(delay_ms = reconnect_delay.as_millis() as u64, "reconnecting after delay");
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn pump(
    stream: WsStream,
    outbound: &mut UnboundedReceiver<OutboundIntent>,
    events: &UnboundedSender<TransportEvent>,
) -> PumpExit {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            intent = outbound.recv() => {
                let Some(intent) = intent else {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Shutdown;
                };
                let text = match encode_intent(&intent) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(event = intent.event_name(), error = %err, "failed to encode intent");
                        continue;
                    }
                };
                trace!(frame = %text, "sending frame");
                if let Err(err) = sink.send(Message::Text(text)).await {
                    warn!(error = %err, "websocket send failed");
                    return PumpExit::Dropped;
                }
            }
            frame = source.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(reason))) => {
                        debug!(?reason, "authority closed the socket");
                        return PumpExit::Dropped;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket receive failed");
                        return PumpExit::Dropped;
                    }
                    None => return PumpExit::Dropped,
                };
                if let Some(exit) = forward_frame(&text, events) {
                    return exit;
                }
            }
        }
    }
}

/// Decodes one authority frame and forwards it. Returns an exit when the
/// session should end.
fn forward_frame(text: &str, events: &UnboundedSender<TransportEvent>) -> Option<PumpExit> {
    let event = match decode_server_frame(text) {
        Ok(ServerFrame::Connect { sid }) => {
            info!(sid = %sid, "session identity assigned");
            TransportEvent::Connected { sid }
        }
        Ok(ServerFrame::Disconnect) => return Some(PumpExit::Dropped),
        Ok(ServerFrame::ConnectError { message }) => TransportEvent::ConnectError { message },
        Ok(ServerFrame::Command(command)) => TransportEvent::Message(command),
        Ok(ServerFrame::Unknown { event }) => {
            debug!(event = %event, "ignoring unknown event");
            return None;
        }
        Err(err) => {
            warn!(error = %err, "dropping malformed frame");
            return None;
        }
    };
    if events.send(event).is_err() {
        return Some(PumpExit::Shutdown);
    }
    None
}
