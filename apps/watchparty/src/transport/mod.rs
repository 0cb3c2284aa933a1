//! Channel to the authority. The engine only sees `TransportEvent`s coming
//! in and hands `OutboundIntent`s back; reconnecting is the transport's job.

use thiserror::Error;
use watchparty_proto::{InboundCommand, SessionId};

pub mod websocket;

pub use websocket::WebSocketTransport;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connecting,
    /// The authority accepted the socket and assigned an identity.
    Connected { sid: SessionId },
    Message(InboundCommand),
    ConnectError { message: String },
    Disconnected,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("transport task stopped")]
    Closed,
}
