use std::time::Duration;
use tokio::time::Instant;

/// Quiescence timer: every event pushes the deadline back, and only a
/// deadline that passes without further events fires.
#[derive(Debug, Clone)]
pub struct Debouncer {
    interval: Duration,
    last_event_time: Option<Instant>,
    pending: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Debouncer {
            interval,
            last_event_time: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_event_time(&self) -> Option<Instant> {
        self.last_event_time
    }

    pub fn event(&mut self, now: Instant) {
        self.last_event_time = Some(now);
        self.pending = Some(now + self.interval);
    }

    /// when the pending timer fires, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Disarms the timer and returns true if its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}
