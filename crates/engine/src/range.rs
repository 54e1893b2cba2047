use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trim range, duration and playback position of one loaded video.
///
/// The model stores what it is given: it never clamps values into
/// `[0, duration]` and never reorders an inverted range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeModel {
    duration: f64,
    start: f64,
    end: Option<f64>,
    position: f64,
}

/// Outcome of checking a candidate position against the trim range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    InRange,
    OutOfRange { seek_to: f64 },
}

/// Immutable view of the range consumed by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeSnapshot {
    pub duration: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub end_is_set: bool,
}

impl RangeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known duration in seconds, `0` while unknown.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn start_time(&self) -> f64 {
        self.start
    }

    /// End of the range; the duration stands in while no end was set.
    pub fn end_time(&self) -> f64 {
        self.end.unwrap_or(self.duration)
    }

    pub fn end_is_set(&self) -> bool {
        self.end.is_some()
    }

    pub fn current_position(&self) -> f64 {
        self.position
    }

    /// Records the duration reported by the player.
    ///
    /// The first positive duration seeds an unset end.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        if self.end.is_none() && self.duration > 0.0 {
            self.end = Some(self.duration);
            debug!(end = self.duration, "range end seeded from duration");
        }
    }

    pub fn set_start_time(&mut self, seconds: f64) {
        self.start = seconds;
    }

    pub fn set_end_time(&mut self, seconds: f64) {
        self.end = Some(seconds);
    }

    /// Stores a commanded position without range checks.
    pub fn set_position(&mut self, seconds: f64) {
        self.position = seconds;
    }

    /// Upper bound used for range checks.
    ///
    /// An unset end with unknown duration leaves the range open-ended.
    pub fn upper_bound(&self) -> Option<f64> {
        self.end.or((self.duration > 0.0).then_some(self.duration))
    }

    pub fn contains(&self, seconds: f64) -> bool {
        seconds >= self.start && self.upper_bound().is_none_or(|end| seconds <= end)
    }

    /// Accepts `seconds` as the current position when it lies inside the
    /// range, otherwise asks the caller to seek back to the start.
    pub fn reconcile_position(&mut self, seconds: f64) -> Reconciliation {
        if self.contains(seconds) {
            self.position = seconds;
            Reconciliation::InRange
        } else {
            Reconciliation::OutOfRange {
                seek_to: self.start,
            }
        }
    }

    /// True when start lies after end, which selects nothing.
    pub fn is_inverted(&self) -> bool {
        self.upper_bound().is_some_and(|end| self.start > end)
    }

    pub fn snapshot(&self) -> RangeSnapshot {
        RangeSnapshot {
            duration: self.duration,
            start_time: self.start,
            end_time: self.end_time(),
            end_is_set: self.end_is_set(),
        }
    }
}
