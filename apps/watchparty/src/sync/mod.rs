//! Client-side reconciliation engine.
//!
//! The engine is sans-io: every entry point takes the current `Instant`, the
//! player is reached through `PlaybackSink`, and outbound traffic is queued
//! as `OutboundIntent`s for the caller to flush. Nothing here spawns tasks or
//! reads the wall clock, so tests can step time by adding durations.

use std::time::Duration;

use crate::playback::ReadyLevel;

pub mod drift;
pub mod guard;
pub mod reconciler;
pub mod role;
pub mod supervisor;

pub use drift::DriftMonitor;
pub use guard::{FeedbackGuard, SuppressionKind, SuppressionWindow};
pub use reconciler::{SyncContext, SyncReconciler};
pub use role::{Role, RoleManager};
pub use supervisor::{ConnectionState, ConnectionSupervisor};

/// Drift tolerated before a hard jump, in seconds.
pub const DRIFT_THRESHOLD: f64 = 0.25;
/// Added to remote play targets to cover the trip from the controller.
pub const LATENCY_COMPENSATION: f64 = 0.2;
pub const LOAD_SUPPRESSION: Duration = Duration::from_millis(500);
pub const SEEK_SUPPRESSION: Duration = Duration::from_millis(1000);
pub const GENERIC_SUPPRESSION: Duration = Duration::from_millis(500);
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct SyncTuning {
    pub drift_threshold: f64,
    pub latency_compensation: f64,
    pub load_suppression: Duration,
    pub seek_suppression: Duration,
    pub generic_suppression: Duration,
    pub resync_interval: Duration,
    /// Viewers only poll once the player has at least this much buffered.
    pub min_ready_level: ReadyLevel,
}

impl SyncTuning {
    pub fn suppression_for(&self, kind: SuppressionKind) -> Duration {
        match kind {
            SuppressionKind::Load => self.load_suppression,
            SuppressionKind::Seek => self.seek_suppression,
            SuppressionKind::Generic => self.generic_suppression,
        }
    }
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            drift_threshold: DRIFT_THRESHOLD,
            latency_compensation: LATENCY_COMPENSATION,
            load_suppression: LOAD_SUPPRESSION,
            seek_suppression: SEEK_SUPPRESSION,
            generic_suppression: GENERIC_SUPPRESSION,
            resync_interval: RESYNC_INTERVAL,
            min_ready_level: ReadyLevel::Metadata,
        }
    }
}
