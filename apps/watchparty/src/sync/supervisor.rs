use std::time::Instant;

use tracing::{debug, info, warn};
use watchparty_proto::{InboundCommand, OutboundIntent, SessionId};

use super::SyncReconciler;
use crate::playback::{PlaybackSink, SinkEvent};
use crate::status::{ConnectionStatus, StatusSurface, UploadStatus};
use crate::transport::TransportEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the reconciler and walks it through the connection lifecycle. Loss
/// of the channel always lands on safe defaults: no identity, no controller,
/// no polling.
pub struct ConnectionSupervisor<P, S> {
    state: ConnectionState,
    reconciler: SyncReconciler<P, S>,
}

impl<P: PlaybackSink, S: StatusSurface> ConnectionSupervisor<P, S> {
    pub fn new(reconciler: SyncReconciler<P, S>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconciler,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconciler(&self) -> &SyncReconciler<P, S> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut SyncReconciler<P, S> {
        &mut self.reconciler
    }

    pub fn local_identity(&self) -> Option<&SessionId> {
        self.reconciler.context().roles.local_identity()
    }

    pub fn is_joined(&self) -> bool {
        self.reconciler.context().joined
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Connecting => {
                self.state = ConnectionState::Connecting;
                self.reconciler
                    .status_mut()
                    .set_connection(ConnectionStatus::Connecting);
            }
            TransportEvent::Connected { sid } => self.on_connected(sid, now),
            TransportEvent::Message(command) => {
                if self.state != ConnectionState::Connected {
                    debug!(command = command.label(), "message outside a live session");
                }
                self.reconciler.handle_command(command, now);
            }
            TransportEvent::ConnectError { message } => {
                warn!(error = %message, "connection attempt failed");
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Disconnected;
                }
                self.reconciler
                    .status_mut()
                    .set_connection(ConnectionStatus::Error(message));
            }
            TransportEvent::Disconnected => self.on_disconnected(),
        }
    }

    fn on_connected(&mut self, sid: SessionId, now: Instant) {
        info!(sid = %sid, "connected to authority");
        self.state = ConnectionState::Connected;
        let ctx = self.reconciler.context_mut();
        ctx.connected = true;
        ctx.drift.arm(now);
        self.reconciler.assign_identity(sid);
        self.reconciler
            .status_mut()
            .set_connection(ConnectionStatus::Connected);
        if self.reconciler.context().joined {
            self.reconciler.emit(OutboundIntent::RequestSync);
        }
    }

    fn on_disconnected(&mut self) {
        if self.state == ConnectionState::Connected {
            info!("disconnected from authority");
        }
        self.state = ConnectionState::Disconnected;
        let ctx = self.reconciler.context_mut();
        ctx.connected = false;
        ctx.mid_seek = false;
        ctx.drift.disarm();
        self.reconciler.reset_roles();
        self.reconciler
            .status_mut()
            .set_connection(ConnectionStatus::Disconnected);
    }

    /// The explicit local join. Only the first call has an effect; returns
    /// whether this call performed the join.
    pub fn join(&mut self, now: Instant) -> bool {
        let ctx = self.reconciler.context_mut();
        if ctx.joined {
            return false;
        }
        ctx.joined = true;
        let stored = ctx.stored_snapshot.take();
        info!(has_snapshot = stored.is_some(), "joined session");

        if let Some(snapshot) = stored {
            self.reconciler
                .handle_command(InboundCommand::Snapshot(snapshot), now);
        }
        if self.state == ConnectionState::Connected {
            self.reconciler.emit(OutboundIntent::RequestSync);
        }
        true
    }

    pub fn handle_sink_event(&mut self, event: SinkEvent, now: Instant) {
        self.reconciler.handle_sink_event(event, now);
    }

    pub fn tick(&mut self, now: Instant) {
        self.reconciler.poll_timers(now);
    }

    pub fn set_upload_status(&mut self, status: UploadStatus) {
        self.reconciler.status_mut().set_upload(status);
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundIntent> {
        self.reconciler.drain_outbound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::MemorySink;
    use crate::status::{RecordingStatus, StatusUpdate};
    use crate::sync::{Role, SyncTuning};
    use std::time::Duration;
    use watchparty_proto::AuthoritativeSnapshot;

    fn supervisor() -> ConnectionSupervisor<MemorySink, RecordingStatus> {
        ConnectionSupervisor::new(SyncReconciler::new(
            MemorySink::new(),
            RecordingStatus::default(),
            SyncTuning::default(),
        ))
    }

    fn connected(sid: &str) -> TransportEvent {
        TransportEvent::Connected {
            sid: SessionId::from(sid),
        }
    }

    #[test]
    fn join_applies_stored_snapshot_and_requests_sync() {
        let t0 = Instant::now();
        let mut sup = supervisor();
        sup.handle_transport_event(connected("me"), t0);
        sup.handle_transport_event(
            TransportEvent::Message(InboundCommand::Snapshot(AuthoritativeSnapshot {
                source_url: Some("a.mp4".into()),
                position_seconds: 12.0,
                is_playing: false,
                controller_id: Some(SessionId::from("X")),
            })),
            t0,
        );
        assert_eq!(sup.reconciler().sink().source(), None);
        assert!(sup.drain_outbound().is_empty());

        assert!(sup.join(t0));
        assert!(!sup.join(t0));
        assert_eq!(sup.reconciler().sink().source(), Some("a.mp4"));
        assert_eq!(sup.drain_outbound(), vec![OutboundIntent::RequestSync]);
    }

    #[test]
    fn reconnect_resumes_with_a_sync_request() {
        let t0 = Instant::now();
        let mut sup = supervisor();
        sup.join(t0);
        sup.handle_transport_event(connected("a"), t0);
        assert_eq!(sup.drain_outbound(), vec![OutboundIntent::RequestSync]);

        sup.handle_transport_event(TransportEvent::Disconnected, t0);
        sup.handle_transport_event(connected("b"), t0 + Duration::from_secs(1));
        assert_eq!(sup.drain_outbound(), vec![OutboundIntent::RequestSync]);
        assert_eq!(sup.local_identity(), Some(&SessionId::from("b")));
    }

    #[test]
    fn disconnect_resets_role_and_stops_polling() {
        let t0 = Instant::now();
        let mut sup = supervisor();
        sup.handle_transport_event(connected("me"), t0);
        sup.handle_transport_event(
            TransportEvent::Message(InboundCommand::ControllerChanged {
                controller_id: Some(SessionId::from("me")),
            }),
            t0,
        );
        assert_eq!(sup.reconciler().role(), Role::Controller);

        sup.handle_transport_event(TransportEvent::Disconnected, t0);
        assert_eq!(sup.state(), ConnectionState::Disconnected);
        assert_eq!(sup.reconciler().role(), Role::Viewer);
        assert!(!sup.reconciler().context().drift.is_armed());
        assert!(!sup.reconciler().sink().controls_visible());
    }

    #[test]
    fn connect_error_only_touches_status() {
        let t0 = Instant::now();
        let mut sup = supervisor();
        sup.join(t0);
        sup.handle_transport_event(
            TransportEvent::ConnectError {
                message: "refused".into(),
            },
            t0,
        );
        assert!(sup.is_joined());
        let updates = &sup.reconciler().status().surface().updates;
        assert_eq!(
            updates.last(),
            Some(&StatusUpdate::Connection(ConnectionStatus::Error(
                "refused".into()
            )))
        );
    }
}
