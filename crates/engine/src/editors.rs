//! State models behind the range editors and the position scrubber.
//!
//! These types hold no widget handle; they turn raw UI input into values
//! the host sends to the engine as commands.

use crate::range::RangeSnapshot;
use crate::time::{format_timestamp, try_parse_timestamp};

/// Granularity of the slider handles and the scrubber, in seconds.
pub const SLIDER_STEP: f64 = 0.1;

/// Dual-handle slider bounded to `[0, duration]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeSlider {
    duration: f64,
}

impl RangeSlider {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: sanitize(duration),
        }
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = sanitize(duration);
    }

    /// Handle positions to draw for `snapshot`, kept inside the track.
    pub fn handles(&self, snapshot: &RangeSnapshot) -> (f64, f64) {
        (self.clamp(snapshot.start_time), self.clamp(snapshot.end_time))
    }

    /// Snaps and clamps a released handle pair into the values sent to the
    /// model. The pair is not reordered.
    ///
    /// # Example
    /// ```
    /// use engine::RangeSlider;
    ///
    /// let slider = RangeSlider::new(60.0);
    /// assert_eq!(slider.commit(12.34, 75.0), (12.3, 60.0));
    /// ```
    pub fn commit(&self, start: f64, end: f64) -> (f64, f64) {
        (self.snap(start), self.snap(end))
    }

    fn snap(&self, seconds: f64) -> f64 {
        self.clamp(snap_to_step(seconds))
    }

    fn clamp(&self, seconds: f64) -> f64 {
        sanitize(seconds).min(self.duration)
    }
}

/// Text input bound to one timestamp of the range.
///
/// The buffer keeps exactly what the user typed. Only parseable text is
/// propagated, and an external model change re-seeds the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeField {
    buffer: String,
    shown: f64,
}

impl TimeField {
    pub fn new(value: f64) -> Self {
        Self {
            buffer: format_timestamp(value),
            shown: value,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// True when the buffer currently parses as a timestamp.
    pub fn is_valid(&self) -> bool {
        try_parse_timestamp(&self.buffer).is_some()
    }

    /// Stores a keystroke; returns the value to propagate when it parses.
    pub fn edit(&mut self, text: impl Into<String>) -> Option<f64> {
        self.buffer = text.into();
        let value = try_parse_timestamp(&self.buffer)?;
        self.shown = value;
        Some(value)
    }

    /// Follows a model value. The buffer is rewritten only when the value
    /// differs from the one this field last produced or displayed.
    pub fn sync(&mut self, value: f64) {
        if value != self.shown {
            self.buffer = format_timestamp(value);
            self.shown = value;
        }
    }
}

/// Start and end text fields of the range editor.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFields {
    pub start: TimeField,
    pub end: TimeField,
}

impl TimeFields {
    pub fn new(snapshot: &RangeSnapshot) -> Self {
        Self {
            start: TimeField::new(snapshot.start_time),
            end: TimeField::new(snapshot.end_time),
        }
    }

    pub fn sync(&mut self, snapshot: &RangeSnapshot) {
        self.start.sync(snapshot.start_time);
        self.end.sync(snapshot.end_time);
    }
}

impl Default for TimeFields {
    fn default() -> Self {
        Self::new(&RangeSnapshot::default())
    }
}

/// Slider over `[0, duration]` that seeks on release.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionScrubber {
    duration: f64,
    draft: f64,
    dragging: bool,
}

impl PositionScrubber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Value to draw: the drag draft, or the model position otherwise.
    pub fn value(&self) -> f64 {
        self.draft
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Follows the model; the draft is left alone while dragging.
    pub fn sync(&mut self, duration: f64, position: f64) {
        self.duration = sanitize(duration);
        if !self.dragging {
            self.draft = position;
        }
    }

    /// Moves only the draft.
    pub fn drag(&mut self, seconds: f64) {
        self.dragging = true;
        self.draft = sanitize(snap_to_step(seconds)).min(self.duration);
    }

    /// Ends a drag and yields the seek target, `None` when nothing was dragged.
    pub fn commit(&mut self) -> Option<f64> {
        if !self.dragging {
            return None;
        }
        self.dragging = false;
        Some(self.draft)
    }
}

fn snap_to_step(seconds: f64) -> f64 {
    (seconds / SLIDER_STEP).round() / (1.0 / SLIDER_STEP)
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() { seconds.max(0.0) } else { 0.0 }
}
