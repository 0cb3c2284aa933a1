use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, info, trace, warn};
use watchparty_proto::{AuthoritativeSnapshot, InboundCommand, OutboundIntent, SessionId};

use super::{DriftMonitor, FeedbackGuard, Role, RoleManager, SuppressionKind, SyncTuning};
use crate::playback::{PlaybackSink, SinkEvent};
use crate::status::{StatusBoard, StatusSurface, UploadStatus};

/// Mutable engine state. Owned by the reconciler and threaded through every
/// handler; there is no other place these flags live.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub roles: RoleManager,
    pub guard: FeedbackGuard,
    pub drift: DriftMonitor,
    pub connected: bool,
    pub joined: bool,
    /// Set between the player's seek-started and seek-settled transitions.
    pub mid_seek: bool,
    /// Latest authority state received before the local join.
    pub stored_snapshot: Option<AuthoritativeSnapshot>,
    /// Snapshot waiting for its source to finish loading.
    pub pending_snapshot: Option<AuthoritativeSnapshot>,
}

impl SyncContext {
    pub fn new(tuning: &SyncTuning) -> Self {
        Self {
            roles: RoleManager::new(),
            guard: FeedbackGuard::new(),
            drift: DriftMonitor::new(tuning.resync_interval),
            connected: false,
            joined: false,
            mid_seek: false,
            stored_snapshot: None,
            pending_snapshot: None,
        }
    }
}

/// Applies authority commands to the local player and turns local player
/// transitions into outbound intents, without ever echoing a transition the
/// reconciler caused itself.
pub struct SyncReconciler<P, S> {
    ctx: SyncContext,
    tuning: SyncTuning,
    sink: P,
    status: StatusBoard<S>,
    outbox: VecDeque<OutboundIntent>,
}

impl<P: PlaybackSink, S: StatusSurface> SyncReconciler<P, S> {
    pub fn new(sink: P, surface: S, tuning: SyncTuning) -> Self {
        Self {
            ctx: SyncContext::new(&tuning),
            tuning,
            sink,
            status: StatusBoard::new(surface),
            outbox: VecDeque::new(),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub(crate) fn context_mut(&mut self) -> &mut SyncContext {
        &mut self.ctx
    }

    pub fn tuning(&self) -> &SyncTuning {
        &self.tuning
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    pub fn status(&self) -> &StatusBoard<S> {
        &self.status
    }

    pub(crate) fn status_mut(&mut self) -> &mut StatusBoard<S> {
        &mut self.status
    }

    pub fn role(&self) -> Role {
        self.ctx.roles.role()
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundIntent> {
        self.outbox.drain(..).collect()
    }

    pub(crate) fn emit(&mut self, intent: OutboundIntent) {
        debug!(
            event = intent.event_name(),
            time = ?intent.time(),
            "queueing intent"
        );
        self.outbox.push_back(intent);
    }

    pub fn handle_command(&mut self, command: InboundCommand, now: Instant) {
        trace!(command = command.label(), "authority command");
        match command {
            InboundCommand::Snapshot(snapshot) => self.apply_snapshot(snapshot, now),
            InboundCommand::VideoLoaded { url } => self.apply_video_loaded(url, now),
            InboundCommand::ControllerChanged { controller_id } => {
                self.apply_controller_change(controller_id)
            }
            InboundCommand::Play { time } => {
                if self.accepts_remote_transition("sync_play") {
                    self.remote_play(time, now);
                }
            }
            InboundCommand::Pause { time } => {
                if self.accepts_remote_transition("sync_pause") {
                    self.remote_pause(time, now);
                }
            }
            InboundCommand::Seek { time } => {
                if self.accepts_remote_transition("sync_seek") {
                    self.remote_seek(time, now);
                }
            }
        }
    }

    /// Local observer path: the player reports a transition, and only a
    /// controller's own, unsuppressed, settled transitions leave the client.
    pub fn handle_sink_event(&mut self, event: SinkEvent, now: Instant) {
        match event {
            SinkEvent::Loaded => self.apply_pending_snapshot(now),
            SinkEvent::PlayRejected { reason } => {
                warn!(reason = %reason, "player refused to start; waiting for next sync cycle");
            }
            SinkEvent::SeekStarted => {
                self.ctx.mid_seek = true;
            }
            SinkEvent::SeekSettled => {
                self.ctx.mid_seek = false;
                if self.may_report(now) {
                    let time = self.sink.position();
                    self.emit(OutboundIntent::Seek { time });
                }
            }
            SinkEvent::Playing => {
                if self.may_report(now) {
                    let time = self.sink.position();
                    self.emit(OutboundIntent::Play { time });
                }
            }
            SinkEvent::Paused => {
                if self.may_report(now) {
                    let time = self.sink.position();
                    self.emit(OutboundIntent::Pause { time });
                }
            }
        }
    }

    /// Closes due suppression windows and runs the drift monitor.
    pub fn poll_timers(&mut self, now: Instant) {
        for kind in self.ctx.guard.expire(now) {
            trace!(?kind, "suppression window closed");
            // Seeks buffer for an unknown time; re-poll once the window closes.
            if kind == SuppressionKind::Seek && self.ctx.connected {
                self.emit(OutboundIntent::RequestSync);
            }
        }

        let eligible = self.resync_eligible();
        if self.ctx.drift.poll(now, eligible) {
            trace!("periodic resync");
            self.emit(OutboundIntent::RequestSync);
        }
    }

    pub fn resync_eligible(&self) -> bool {
        self.ctx.connected
            && self.ctx.joined
            && self.sink.source().is_some()
            && self.sink.ready_level() >= self.tuning.min_ready_level
            && !self.ctx.roles.is_controller()
    }

    pub(crate) fn assign_identity(&mut self, sid: SessionId) {
        let before = self.ctx.roles.role();
        self.ctx.roles.assign_identity(sid);
        self.after_role_update(before);
    }

    pub(crate) fn reset_roles(&mut self) {
        let before = self.ctx.roles.role();
        self.ctx.roles.reset();
        self.after_role_update(before);
    }

    fn apply_snapshot(&mut self, snapshot: AuthoritativeSnapshot, now: Instant) {
        if !self.ctx.joined {
            trace!("holding snapshot until local join");
            self.ctx.stored_snapshot = Some(snapshot);
            return;
        }

        if let Some(pending) = self.ctx.pending_snapshot.as_mut() {
            if pending.source_url == snapshot.source_url {
                trace!("source still loading; replacing pending snapshot");
                *pending = snapshot;
                return;
            }
        }

        if let Some(url) = snapshot.source_url.as_deref() {
            if self.sink.source() != Some(url) {
                info!(url = %url, "authority source differs; loading");
                self.suppress(SuppressionKind::Load, now);
                self.ctx.mid_seek = false;
                self.sink.set_source(url);
                self.sink.load();
                // Position and play state of an unloaded resource are not
                // trusted; they are applied once the player reports `Loaded`.
                self.ctx.pending_snapshot = Some(snapshot);
                return;
            }
        }

        let local = self.sink.observe();
        let drift = (snapshot.position_seconds - local.position_seconds).abs();
        if drift > self.tuning.drift_threshold {
            if self.ctx.guard.is_suppressed(now) {
                trace!(drift, "drift correction deferred by open suppression window");
            } else {
                debug!(
                    drift,
                    from = local.position_seconds,
                    to = snapshot.position_seconds,
                    "hard drift correction"
                );
                self.suppress(SuppressionKind::Generic, now);
                self.sink.set_position(snapshot.position_seconds);
            }
        }

        if snapshot.is_playing && local.is_paused {
            self.suppress(SuppressionKind::Generic, now);
            self.start_playback("sync_state");
        } else if !snapshot.is_playing && !local.is_paused {
            self.suppress(SuppressionKind::Generic, now);
            self.sink.pause();
        }

        self.apply_controller_id(snapshot.controller_id);
    }

    fn apply_pending_snapshot(&mut self, now: Instant) {
        let Some(snapshot) = self.ctx.pending_snapshot.take() else {
            return;
        };
        if snapshot.source_url.as_deref() != self.sink.source() {
            debug!("discarding pending snapshot for a replaced source");
            return;
        }

        self.suppress(SuppressionKind::Generic, now);
        self.sink.set_position(snapshot.position_seconds);
        if snapshot.is_playing {
            self.start_playback("sync_state");
        } else if !self.sink.is_paused() {
            self.sink.pause();
        }
        self.apply_controller_id(snapshot.controller_id);
    }

    fn apply_video_loaded(&mut self, url: String, now: Instant) {
        if !self.ctx.joined {
            let stored = self
                .ctx
                .stored_snapshot
                .get_or_insert_with(AuthoritativeSnapshot::default);
            stored.source_url = Some(url);
            stored.position_seconds = 0.0;
            stored.is_playing = false;
            self.status.set_upload(UploadStatus::Idle);
            return;
        }

        info!(url = %url, "authority pushed a new video");
        self.suppress(SuppressionKind::Load, now);
        self.ctx.pending_snapshot = None;
        self.ctx.mid_seek = false;
        self.sink.set_source(&url);
        self.sink.load();
        self.sink.set_position(0.0);
        self.sink.pause();
        self.status.set_upload(UploadStatus::Idle);
    }

    fn apply_controller_change(&mut self, controller_id: Option<SessionId>) {
        for held in [
            self.ctx.stored_snapshot.as_mut(),
            self.ctx.pending_snapshot.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            held.controller_id = controller_id.clone();
        }
        self.apply_controller_id(controller_id);
    }

    fn apply_controller_id(&mut self, controller_id: Option<SessionId>) {
        let before = self.ctx.roles.role();
        if self.ctx.roles.update_controller_id(controller_id) {
            info!(
                controller = ?self.ctx.roles.controller_id().map(SessionId::as_str),
                role = ?self.ctx.roles.role(),
                "controller updated"
            );
        }
        self.after_role_update(before);
    }

    fn after_role_update(&mut self, before: Role) {
        let role = self.ctx.roles.role();
        if role != before {
            self.sink.set_controls_visible(role == Role::Controller);
        }
        self.status.set_role(role, self.ctx.roles.controller_id());
    }

    fn accepts_remote_transition(&self, label: &'static str) -> bool {
        if !self.ctx.joined {
            trace!(command = label, "ignoring remote transition before local join");
            return false;
        }
        if self.ctx.roles.is_controller() {
            // The controller applied this locally before the authority echoed it.
            trace!(command = label, "controller ignores echoed transition");
            return false;
        }
        true
    }

    fn remote_play(&mut self, time: f64, now: Instant) {
        let target = time + self.tuning.latency_compensation;
        self.suppress(SuppressionKind::Generic, now);
        if (self.sink.position() - target).abs() > self.tuning.drift_threshold {
            self.sink.set_position(target);
        }
        self.start_playback("sync_play");
    }

    fn remote_pause(&mut self, time: f64, now: Instant) {
        self.suppress(SuppressionKind::Generic, now);
        self.sink.pause();
        if (self.sink.position() - time).abs() > self.tuning.drift_threshold {
            self.sink.set_position(time);
        }
    }

    fn remote_seek(&mut self, time: f64, now: Instant) {
        self.suppress(SuppressionKind::Seek, now);
        self.sink.set_position(time);
    }

    fn start_playback(&mut self, cause: &'static str) {
        if let Err(err) = self.sink.play() {
            warn!(cause, error = %err, "play attempt rejected; next sync cycle will retry");
        }
    }

    fn suppress(&mut self, kind: SuppressionKind, now: Instant) {
        let duration = self.tuning.suppression_for(kind);
        self.ctx.guard.begin_suppression(kind, duration, now);
    }

    fn may_report(&self, now: Instant) -> bool {
        self.ctx.roles.is_controller() && !self.ctx.guard.is_suppressed(now) && !self.ctx.mid_seek
    }
}
