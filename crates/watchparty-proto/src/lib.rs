//! Shared message definitions for the watchparty sync channel.
//! The client engine only deals in `InboundCommand` and `OutboundIntent`;
//! the `wire` module owns the JSON envelope and the defaulting rules that
//! turn loosely-typed authority payloads into those values.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod wire;

pub use wire::{decode_server_frame, encode_intent, Envelope, FrameError, ServerFrame};

/// Opaque participant identity assigned by the authority on connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Full authoritative playback state. Never mutated by the client, only
/// compared against what the local player reports.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoritativeSnapshot {
    /// `None` means "no source change", not "unload".
    pub source_url: Option<String>,
    pub position_seconds: f64,
    pub is_playing: bool,
    pub controller_id: Option<SessionId>,
}

impl Default for AuthoritativeSnapshot {
    fn default() -> Self {
        Self {
            source_url: None,
            position_seconds: 0.0,
            is_playing: false,
            controller_id: None,
        }
    }
}

/// Commands pushed by the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    Snapshot(AuthoritativeSnapshot),
    VideoLoaded { url: String },
    Play { time: f64 },
    Pause { time: f64 },
    Seek { time: f64 },
    ControllerChanged { controller_id: Option<SessionId> },
}

impl InboundCommand {
    pub fn label(&self) -> &'static str {
        match self {
            InboundCommand::Snapshot(_) => "sync_state",
            InboundCommand::VideoLoaded { .. } => "video_loaded",
            InboundCommand::Play { .. } => "sync_play",
            InboundCommand::Pause { .. } => "sync_pause",
            InboundCommand::Seek { .. } => "sync_seek",
            InboundCommand::ControllerChanged { .. } => "controller_change",
        }
    }
}

/// Requests the client sends to the authority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundIntent {
    RequestSync,
    Play { time: f64 },
    Pause { time: f64 },
    Seek { time: f64 },
}

impl OutboundIntent {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundIntent::RequestSync => "request_sync",
            OutboundIntent::Play { .. } => "play",
            OutboundIntent::Pause { .. } => "pause",
            OutboundIntent::Seek { .. } => "seek",
        }
    }

    pub fn time(&self) -> Option<f64> {
        match self {
            OutboundIntent::RequestSync => None,
            OutboundIntent::Play { time }
            | OutboundIntent::Pause { time }
            | OutboundIntent::Seek { time } => Some(*time),
        }
    }
}
