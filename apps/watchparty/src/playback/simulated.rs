use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

use super::{PlaybackSink, ReadyLevel, SinkError, SinkEvent};

/// Headless stand-in for a media element. The playhead advances with wall
/// time while playing, and every transition is reported on the event channel
/// the same way a browser video element fires `playing`/`pause`/`seeking`/
/// `seeked`/`loadedmetadata`.
///
/// Playback stays locked until `unlock` is called from a user gesture,
/// mirroring environments that refuse to start audio autonomously.
pub struct SimulatedPlayer {
    source: Option<String>,
    anchor_position: f64,
    playing_since: Option<Instant>,
    ready: ReadyLevel,
    controls_visible: bool,
    unlocked: bool,
    events: UnboundedSender<SinkEvent>,
}

impl SimulatedPlayer {
    pub fn new(events: UnboundedSender<SinkEvent>) -> Self {
        Self {
            source: None,
            anchor_position: 0.0,
            playing_since: None,
            ready: ReadyLevel::Nothing,
            controls_visible: false,
            unlocked: false,
            events,
        }
    }

    pub fn unlock(&mut self) {
        if !self.unlocked {
            debug!("playback unlocked by user gesture");
        }
        self.unlocked = true;
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    fn emit(&self, event: SinkEvent) {
        trace!(?event, "player event");
        // The receiver only disappears while the client is shutting down.
        let _ = self.events.send(event);
    }
}

impl PlaybackSink for SimulatedPlayer {
    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn set_source(&mut self, url: &str) {
        let was_playing = self.playing_since.take().is_some();
        self.source = Some(url.to_string());
        self.anchor_position = 0.0;
        self.ready = ReadyLevel::Nothing;
        if was_playing {
            self.emit(SinkEvent::Paused);
        }
    }

    fn position(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.anchor_position + since.elapsed().as_secs_f64(),
            None => self.anchor_position,
        }
    }

    fn set_position(&mut self, seconds: f64) {
        self.emit(SinkEvent::SeekStarted);
        self.anchor_position = seconds.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        self.emit(SinkEvent::SeekSettled);
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    fn ready_level(&self) -> ReadyLevel {
        self.ready
    }

    fn set_controls_visible(&mut self, visible: bool) {
        self.controls_visible = visible;
    }

    fn load(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.ready = ReadyLevel::EnoughData;
        self.emit(SinkEvent::Loaded);
    }

    fn play(&mut self) -> Result<(), SinkError> {
        if self.source.is_none() {
            return Err(SinkError::NoSource);
        }
        if !self.unlocked {
            return Err(SinkError::PlaybackRejected(
                "playback requires a user gesture; join first".into(),
            ));
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
            self.emit(SinkEvent::Playing);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.playing_since.is_some() {
            self.anchor_position = self.position();
            self.playing_since = None;
            self.emit(SinkEvent::Paused);
        }
    }
}
