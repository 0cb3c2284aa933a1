use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionKind {
    /// A new source is loading on behalf of the authority.
    Load,
    /// A remote seek is buffering; closing it forces a resync.
    Seek,
    /// Any other remotely-driven transition.
    Generic,
}

impl SuppressionKind {
    pub const ALL: [SuppressionKind; 3] = [
        SuppressionKind::Load,
        SuppressionKind::Seek,
        SuppressionKind::Generic,
    ];

    #[inline]
    fn as_index(self) -> usize {
        match self {
            SuppressionKind::Load => 0,
            SuppressionKind::Seek => 1,
            SuppressionKind::Generic => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionWindow {
    pub kind: SuppressionKind,
    pub expires_at: Instant,
}

/// Suppression windows that keep remotely-caused player transitions from
/// being reported back to the authority. At most one window per kind is
/// open; reopening a kind moves its deadline instead of stacking.
#[derive(Debug, Default, Clone)]
pub struct FeedbackGuard {
    deadlines: [Option<Instant>; 3],
}

impl FeedbackGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_suppression(&mut self, kind: SuppressionKind, duration: Duration, now: Instant) {
        let expires_at = now + duration;
        let slot = &mut self.deadlines[kind.as_index()];
        *slot = Some(match *slot {
            Some(existing) if existing > expires_at => existing,
            _ => expires_at,
        });
    }

    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.deadlines
            .iter()
            .flatten()
            .any(|deadline| now < *deadline)
    }

    pub fn window(&self, kind: SuppressionKind) -> Option<SuppressionWindow> {
        self.deadlines[kind.as_index()].map(|expires_at| SuppressionWindow { kind, expires_at })
    }

    pub fn active(&self, now: Instant) -> Vec<SuppressionWindow> {
        SuppressionKind::ALL
            .into_iter()
            .filter_map(|kind| self.window(kind))
            .filter(|window| now < window.expires_at)
            .collect()
    }

    /// Closes every window whose deadline has passed and returns their kinds
    /// so the caller can run expiry hooks.
    pub fn expire(&mut self, now: Instant) -> Vec<SuppressionKind> {
        let mut closed = Vec::new();
        for kind in SuppressionKind::ALL {
            let slot = &mut self.deadlines[kind.as_index()];
            if matches!(*slot, Some(deadline) if deadline <= now) {
                *slot = None;
                closed.push(kind);
            }
        }
        closed
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }
}
