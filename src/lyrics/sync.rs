//! Keeping the highlighted lyric line in step with playback.
//!
//! Playback time updates arrive far more often than the highlight needs to
//! move. [`LyricThrottle`] coalesces them into at most one evaluation per
//! interval, and [`LyricCursor`] reports an index only when it changes.

use super::parser::LyricLine;
use std::time::Duration;
use tokio::time::Instant;

/// Index of the line playing at `time`.
///
/// Times before the first line clamp to 0. `None` only for empty input.
/// A NaN time counts as the start of the track.
pub fn active_index_at(time: f64, lines: &[LyricLine]) -> Option<usize> {
    if lines.is_empty() {
        return None;
    }
    let time = if time.is_nan() { 0.0 } else { time };

    for (i, line) in lines.iter().enumerate() {
        let until_next = lines.get(i + 1).is_none_or(|next| time < next.time);
        if line.time <= time && until_next {
            return Some(i);
        }
    }
    Some(0)
}

/// Remembers the last highlighted line.
#[derive(Debug, Clone, Default)]
pub struct LyricCursor {
    last: Option<usize>,
}

impl LyricCursor {
    /// New active index, or `None` when the highlight stays where it is.
    pub fn advance(&mut self, time: f64, lines: &[LyricLine]) -> Option<usize> {
        let idx = active_index_at(time, lines)?;
        if self.last == Some(idx) {
            return None;
        }
        self.last = Some(idx);
        Some(idx)
    }

    pub fn current(&self) -> Option<usize> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Coalesces time updates into one evaluation per interval.
///
/// The first observation arms a deadline; observations before it fires only
/// replace the pending time. There is never more than one deadline.
#[derive(Debug, Clone)]
pub struct LyricThrottle {
    interval: Duration,
    deadline: Option<Instant>,
    latest: f64,
}

impl LyricThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            latest: 0.0,
        }
    }

    /// Record a playback time. Returns true when this call armed the deadline.
    pub fn observe(&mut self, time: f64, now: Instant) -> bool {
        self.latest = time;
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.interval);
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The latest time once the deadline has passed; disarms the throttle.
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                Some(self.latest)
            }
            _ => None,
        }
    }

    /// Drop any pending evaluation, e.g. when the track changes.
    pub fn clear(&mut self) {
        self.deadline = None;
    }
}
