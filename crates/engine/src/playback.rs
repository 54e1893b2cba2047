use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::range::{RangeModel, Reconciliation};
use crate::widget::{VideoWidget, WidgetState};

/// Default cadence of the position polling loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Playback state mirrored from the widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl From<WidgetState> for PlaybackState {
    fn from(value: WidgetState) -> Self {
        match value {
            WidgetState::Playing => Self::Playing,
            WidgetState::Paused | WidgetState::Buffering => Self::Paused,
            WidgetState::Unstarted | WidgetState::Ended | WidgetState::Cued => Self::Stopped,
        }
    }
}

/// Armed polling deadline. Exists only while playback is `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PollTimer {
    next_due: Instant,
}

/// Mediates between the range model and one video widget.
///
/// Every command is a no-op until the widget has signalled ready.
#[derive(Debug)]
pub struct PlaybackAdapter<W> {
    widget: W,
    bound: bool,
    state: PlaybackState,
    looping: bool,
    poll_interval: Duration,
    poll: Option<PollTimer>,
}

impl<W> PlaybackAdapter<W>
where
    W: VideoWidget,
{
    pub fn new(widget: W, poll_interval: Duration, looping: bool) -> Self {
        Self {
            widget,
            bound: false,
            state: PlaybackState::Stopped,
            looping,
            poll_interval,
            poll: None,
        }
    }

    /// True once the widget signalled ready and until teardown.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// When the next poll tick is due, if polling is armed.
    pub fn poll_deadline(&self) -> Option<Instant> {
        self.poll.map(|timer| timer.next_due)
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    /// Binds the widget and forwards its duration to the range.
    pub fn on_ready(&mut self, range: &mut RangeModel) {
        self.bound = true;
        let duration = match self.widget.duration() {
            Ok(duration) => duration,
            Err(error) => {
                warn!(%error, "duration unavailable on ready");
                0.0
            }
        };
        debug!(duration, "widget ready");
        range.set_duration(duration);
    }

    /// Mirrors a widget state change.
    pub fn on_state_change(&mut self, state: WidgetState) {
        self.transition(PlaybackState::from(state));
    }

    /// Runs one polling step: publish the measured position and apply the
    /// end-of-range policy. Returns `false` when polling is not active.
    pub fn poll_tick(&mut self, range: &mut RangeModel) -> bool {
        if self.state != PlaybackState::Playing || !self.bound {
            self.poll = None;
            return false;
        }
        self.rearm_poll();

        let position = match self.widget.current_time() {
            Ok(position) => position,
            Err(error) => {
                warn!(%error, "position poll failed");
                return true;
            }
        };

        match range.upper_bound() {
            Some(end) if position >= end => {
                if self.looping {
                    debug!(position, start = range.start_time(), "range end reached, looping");
                    self.seek_widget(range.start_time());
                    range.set_position(range.start_time());
                } else {
                    debug!(position, end, "range end reached, pausing");
                    log_failure("pause", self.widget.pause());
                    self.transition(PlaybackState::Paused);
                    self.apply_reconciliation(range, position);
                }
            }
            _ => self.apply_reconciliation(range, position),
        }

        true
    }

    /// Seeks to `seconds`, then pulls the position back into the range if
    /// it landed outside.
    pub fn seek(&mut self, range: &mut RangeModel, seconds: f64) {
        if !self.bound {
            return;
        }
        self.seek_widget(seconds);
        range.set_position(seconds);
        self.enforce_range(range);
    }

    pub fn skip_to_start(&mut self, range: &mut RangeModel) {
        if !self.bound {
            return;
        }
        let start = range.start_time();
        self.seek_widget(start);
        range.set_position(start);
    }

    pub fn skip_to_end(&mut self, range: &mut RangeModel) {
        if !self.bound {
            return;
        }
        let end = range.end_time();
        self.seek_widget(end);
        range.set_position(end);
    }

    /// Plays or pauses depending on the live widget state.
    pub fn toggle_play(&mut self) {
        if !self.bound {
            return;
        }
        let live = match self.widget.player_state() {
            Ok(state) => PlaybackState::from(state),
            Err(error) => {
                warn!(%error, cached = ?self.state, "live state unavailable, using cached state");
                self.state
            }
        };

        if live == PlaybackState::Playing {
            log_failure("pause", self.widget.pause());
            self.transition(PlaybackState::Paused);
        } else {
            log_failure("play", self.widget.play());
            self.transition(PlaybackState::Playing);
        }
    }

    pub fn toggle_loop(&mut self) {
        self.looping = !self.looping;
    }

    /// Issues one corrective seek when the current position left the range.
    pub fn enforce_range(&mut self, range: &mut RangeModel) {
        if !self.bound {
            return;
        }
        let position = range.current_position();
        if !range.contains(position) {
            let start = range.start_time();
            debug!(position, start, "position outside range, seeking to start");
            self.seek_widget(start);
            range.set_position(start);
        }
    }

    /// Stops playback and disarms polling; the adapter stays inert afterwards.
    pub fn teardown(&mut self) {
        self.poll = None;
        if self.bound {
            log_failure("stop", self.widget.stop());
        }
        self.bound = false;
        self.state = PlaybackState::Stopped;
    }

    fn apply_reconciliation(&mut self, range: &mut RangeModel, position: f64) {
        if let Reconciliation::OutOfRange { seek_to } = range.reconcile_position(position) {
            debug!(position, seek_to, "polled position outside range");
            self.seek_widget(seek_to);
            range.set_position(seek_to);
        }
    }

    fn transition(&mut self, next: PlaybackState) {
        if next == PlaybackState::Playing {
            if self.poll.is_none() {
                self.rearm_poll();
            }
        } else {
            self.poll = None;
        }
        self.state = next;
    }

    fn rearm_poll(&mut self) {
        self.poll = Some(PollTimer {
            next_due: Instant::now() + self.poll_interval,
        });
    }

    fn seek_widget(&mut self, seconds: f64) {
        log_failure("seek_to", self.widget.seek_to(seconds, true));
    }
}

fn log_failure(operation: &'static str, result: Result<()>) {
    if let Err(error) = result {
        warn!(operation, %error, "widget command failed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{PlaybackAdapter, PlaybackState};
    use crate::range::RangeModel;
    use crate::testing::{MockWidget, WidgetCall};
    use crate::widget::WidgetState;

    fn ready_adapter(widget: MockWidget, range: &mut RangeModel) -> PlaybackAdapter<MockWidget> {
        let mut adapter = PlaybackAdapter::new(widget, Duration::from_millis(300), false);
        adapter.on_ready(range);
        adapter
    }

    #[test]
    fn ready_forwards_duration_to_range() {
        let widget = MockWidget::with_duration(120.0);
        let mut range = RangeModel::new();

        let adapter = ready_adapter(widget, &mut range);

        assert!(adapter.is_bound());
        assert_eq!(range.duration(), 120.0);
        assert_eq!(range.end_time(), 120.0);
    }

    #[test]
    fn commands_are_inert_before_ready() {
        let widget = MockWidget::with_duration(120.0);
        let calls = widget.calls();
        let mut range = RangeModel::new();
        let mut adapter = PlaybackAdapter::new(widget, Duration::from_millis(300), false);

        adapter.skip_to_start(&mut range);
        adapter.skip_to_end(&mut range);
        adapter.toggle_play();
        adapter.seek(&mut range, 10.0);

        assert!(calls.lock().expect("lock calls").is_empty());
        assert_eq!(adapter.state(), PlaybackState::Stopped);
    }

    #[test]
    fn state_change_maps_codes_and_arms_polling() {
        let widget = MockWidget::with_duration(120.0);
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);

        adapter.on_state_change(WidgetState::Playing);
        assert_eq!(adapter.state(), PlaybackState::Playing);
        assert!(adapter.poll_deadline().is_some());

        adapter.on_state_change(WidgetState::Buffering);
        assert_eq!(adapter.state(), PlaybackState::Paused);
        assert!(adapter.poll_deadline().is_none());

        adapter.on_state_change(WidgetState::Ended);
        assert_eq!(adapter.state(), PlaybackState::Stopped);
    }

    #[test]
    fn poll_publishes_in_range_position() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        adapter.on_state_change(WidgetState::Playing);
        handle.set_current_time(12.5);

        assert!(adapter.poll_tick(&mut range));

        assert_eq!(range.current_position(), 12.5);
        assert!(handle.calls().lock().expect("lock calls").is_empty());
    }

    #[test]
    fn poll_at_end_with_loop_seeks_to_start_and_keeps_playing() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        range.set_start_time(30.0);
        range.set_end_time(60.0);
        adapter.toggle_loop();
        adapter.on_state_change(WidgetState::Playing);
        handle.set_current_time(60.0);

        adapter.poll_tick(&mut range);

        assert_eq!(adapter.state(), PlaybackState::Playing);
        assert!(adapter.is_polling());
        assert_eq!(range.current_position(), 30.0);
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::SeekTo(30.0)]
        );
    }

    #[test]
    fn poll_at_end_without_loop_pauses_and_stops_polling() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        range.set_start_time(30.0);
        range.set_end_time(60.0);
        adapter.on_state_change(WidgetState::Playing);
        handle.set_current_time(60.0);

        adapter.poll_tick(&mut range);

        assert_eq!(adapter.state(), PlaybackState::Paused);
        assert!(!adapter.is_polling());
        assert_eq!(range.current_position(), 60.0);
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::Pause]
        );
        assert!(!adapter.poll_tick(&mut range));
    }

    #[test]
    fn poll_past_end_without_loop_pauses_then_returns_to_start() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        range.set_start_time(30.0);
        range.set_end_time(60.0);
        adapter.on_state_change(WidgetState::Playing);
        handle.set_current_time(60.2);

        adapter.poll_tick(&mut range);

        assert_eq!(range.current_position(), 30.0);
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::Pause, WidgetCall::SeekTo(30.0)]
        );
    }

    #[test]
    fn poll_before_start_seeks_to_start() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        range.set_start_time(30.0);
        adapter.on_state_change(WidgetState::Playing);
        handle.set_current_time(3.0);

        adapter.poll_tick(&mut range);

        assert_eq!(range.current_position(), 30.0);
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::SeekTo(30.0)]
        );
    }

    #[test]
    fn toggle_play_reads_live_widget_state() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        adapter.on_state_change(WidgetState::Playing);
        handle.set_state(WidgetState::Paused);

        adapter.toggle_play();

        assert_eq!(adapter.state(), PlaybackState::Playing);
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::Play]
        );
    }

    #[test]
    fn toggle_play_pauses_live_playing_widget() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        handle.set_state(WidgetState::Playing);

        adapter.toggle_play();

        assert_eq!(adapter.state(), PlaybackState::Paused);
        assert!(!adapter.is_polling());
    }

    #[test]
    fn skips_update_position_synchronously() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        range.set_start_time(10.0);
        range.set_end_time(50.0);

        adapter.skip_to_end(&mut range);
        assert_eq!(range.current_position(), 50.0);
        adapter.skip_to_start(&mut range);
        assert_eq!(range.current_position(), 10.0);

        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::SeekTo(50.0), WidgetCall::SeekTo(10.0)]
        );
    }

    #[test]
    fn seek_outside_range_is_corrected_once() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        range.set_start_time(30.0);
        range.set_end_time(60.0);

        adapter.seek(&mut range, 90.0);

        assert_eq!(range.current_position(), 30.0);
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::SeekTo(90.0), WidgetCall::SeekTo(30.0)]
        );
    }

    #[test]
    fn failed_position_read_keeps_polling() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        adapter.on_state_change(WidgetState::Playing);
        handle.fail_getters(true);

        assert!(adapter.poll_tick(&mut range));

        assert!(adapter.is_polling());
        assert_eq!(range.current_position(), 0.0);
    }

    #[test]
    fn teardown_stops_widget_and_disarms_polling() {
        let widget = MockWidget::with_duration(120.0);
        let handle = widget.clone();
        let mut range = RangeModel::new();
        let mut adapter = ready_adapter(widget, &mut range);
        adapter.on_state_change(WidgetState::Playing);

        adapter.teardown();

        assert!(!adapter.is_polling());
        assert!(!adapter.is_bound());
        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::Stop]
        );
    }
}
