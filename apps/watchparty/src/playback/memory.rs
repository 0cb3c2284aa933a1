use super::{PlaybackSink, ReadyLevel, SinkError};

/// Every mutation the reconciler performed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    SetSource(String),
    Load,
    SetPosition(f64),
    Play,
    Pause,
    SetControlsVisible(bool),
}

/// In-memory player that never emits events on its own. Tests drive its
/// clock and inject `SinkEvent`s explicitly.
#[derive(Debug)]
pub struct MemorySink {
    source: Option<String>,
    position: f64,
    paused: bool,
    ready: ReadyLevel,
    controls_visible: bool,
    reject_play: Option<String>,
    calls: Vec<SinkCall>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self {
            source: None,
            position: 0.0,
            paused: true,
            ready: ReadyLevel::Nothing,
            controls_visible: false,
            reject_play: None,
            calls: Vec::new(),
        }
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that already has `url` loaded and fully buffered.
    pub fn with_source(url: &str) -> Self {
        Self {
            source: Some(url.to_string()),
            ready: ReadyLevel::EnoughData,
            ..Self::default()
        }
    }

    pub fn at_position(mut self, seconds: f64) -> Self {
        self.position = seconds;
        self
    }

    pub fn playing(mut self) -> Self {
        self.paused = false;
        self
    }

    pub fn reject_play(&mut self, reason: impl Into<String>) {
        self.reject_play = Some(reason.into());
    }

    pub fn allow_play(&mut self) {
        self.reject_play = None;
    }

    pub fn set_ready_level(&mut self, level: ReadyLevel) {
        self.ready = level;
    }

    /// Moves the playhead as if the media had been playing for `seconds`.
    pub fn advance(&mut self, seconds: f64) {
        if !self.paused {
            self.position += seconds;
        }
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl PlaybackSink for MemorySink {
    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn set_source(&mut self, url: &str) {
        self.calls.push(SinkCall::SetSource(url.to_string()));
        self.source = Some(url.to_string());
        self.position = 0.0;
        self.paused = true;
        self.ready = ReadyLevel::Nothing;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn set_position(&mut self, seconds: f64) {
        self.calls.push(SinkCall::SetPosition(seconds));
        self.position = seconds.max(0.0);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn ready_level(&self) -> ReadyLevel {
        self.ready
    }

    fn set_controls_visible(&mut self, visible: bool) {
        self.calls.push(SinkCall::SetControlsVisible(visible));
        self.controls_visible = visible;
    }

    fn load(&mut self) {
        self.calls.push(SinkCall::Load);
        if self.source.is_some() {
            self.ready = ReadyLevel::EnoughData;
        }
    }

    fn play(&mut self) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Play);
        if let Some(reason) = &self.reject_play {
            return Err(SinkError::PlaybackRejected(reason.clone()));
        }
        if self.source.is_none() {
            return Err(SinkError::NoSource);
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.push(SinkCall::Pause);
        self.paused = true;
    }
}
