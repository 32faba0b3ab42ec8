use super::search::Match;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Where a walk stands after scanning a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// only known once the length of the walk is known
    pub percent: Option<u32>,
    pub seen_count: u64,
    pub total_count: Option<u64>,
    pub found_count: u64,
}

impl Progress {
    pub fn new(seen_count: u64, total_count: Option<u64>, found_count: u64) -> Self {
        let percent = total_count.filter(|total| *total > 0).map(|total| {
            let percent = u128::from(seen_count) * 100 / u128::from(total);
            percent.min(100) as u32
        });
        Progress {
            percent,
            seen_count,
            total_count,
            found_count,
        }
    }
}

/// What a walk reports while it runs.
#[derive(Debug, Clone)]
pub enum WalkEvent<I> {
    Progress(Progress),
    Match(Match<I>),
}

/// Collapses a burst of progress updates to at most one per window.
///
/// Updates arriving inside the window are held back; the most recent of
/// them is handed out by [`flush`](Self::flush) once the walk is over.
#[derive(Debug)]
pub struct ProgressThrottle {
    window: Duration,
    last_shown: Option<Instant>,
    held: Option<Progress>,
}

impl ProgressThrottle {
    pub fn new(window: Duration) -> Self {
        ProgressThrottle {
            window,
            last_shown: None,
            held: None,
        }
    }

    /// The update to show now, if any.
    pub fn offer(&mut self, progress: Progress, now: Instant) -> Option<Progress> {
        let due = match self.last_shown {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.window,
        };
        if due {
            self.last_shown = Some(now);
            self.held = None;
            Some(progress)
        } else {
            self.held = Some(progress);
            None
        }
    }

    /// The last update that was held back, if any.
    pub fn flush(&mut self) -> Option<Progress> {
        self.held.take()
    }
}
