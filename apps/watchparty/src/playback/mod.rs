//! Control and observation contract of the local media player.
//!
//! The reconciler only talks to a `PlaybackSink`. Native transitions travel
//! the other way as `SinkEvent`s, delivered by whoever owns the player.

use thiserror::Error;

pub mod memory;
pub mod simulated;

pub use memory::{MemorySink, SinkCall};
pub use simulated::SimulatedPlayer;

/// Buffering readiness, ordered from "nothing known" to "can play through".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyLevel {
    #[default]
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

/// Transitions reported by the player itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Playing,
    Paused,
    SeekStarted,
    SeekSettled,
    /// The current source finished loading and its position is now trustworthy.
    Loaded,
    /// A play attempt was refused after it was accepted for processing.
    PlayRejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("playback refused: {0}")]
    PlaybackRejected(String),
    #[error("no source loaded")]
    NoSource,
}

/// What the player reports at decision time. Never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalObservation {
    pub position_seconds: f64,
    pub is_paused: bool,
    pub ready_level: ReadyLevel,
}

pub trait PlaybackSink {
    fn source(&self) -> Option<&str>;
    fn set_source(&mut self, url: &str);
    fn position(&self) -> f64;
    fn set_position(&mut self, seconds: f64);
    fn is_paused(&self) -> bool;
    fn ready_level(&self) -> ReadyLevel;
    fn set_controls_visible(&mut self, visible: bool);
    fn load(&mut self);
    fn play(&mut self) -> Result<(), SinkError>;
    fn pause(&mut self);

    fn observe(&self) -> LocalObservation {
        LocalObservation {
            position_seconds: self.position(),
            is_paused: self.is_paused(),
            ready_level: self.ready_level(),
        }
    }
}
