use std::time::{Duration, Instant};

/// Recurring resync timer. It only fires while armed; whether a due tick
/// actually turns into a `RequestSync` is decided by the caller, which knows
/// the role, join state and player readiness at that instant.
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    interval: Duration,
    next_tick: Option<Instant>,
}

impl DriftMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn arm(&mut self, now: Instant) {
        self.next_tick = Some(now + self.interval);
    }

    pub fn disarm(&mut self) {
        self.next_tick = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Returns true when a tick is due and `eligible` holds. Missed ticks
    /// collapse into one; the next tick is scheduled from `now`.
    pub fn poll(&mut self, now: Instant, eligible: bool) -> bool {
        match self.next_tick {
            Some(due) if now >= due => {
                self.next_tick = Some(now + self.interval);
                eligible
            }
            _ => false,
        }
    }
}
