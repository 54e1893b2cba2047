use engine::{WidgetSignal, WidgetState};
use serde_json::Value;
use tracing::debug;

/// Properties observed on every mpv connection, with their observer ids.
pub(crate) const OBSERVED_PROPERTIES: [(u64, &str); 5] = [
    (1, "pause"),
    (2, "eof-reached"),
    (3, "paused-for-cache"),
    (4, "idle-active"),
    (5, "duration"),
];

/// Folds mpv property changes into widget signals.
///
/// `Ready` fires once, when a positive duration is first seen. State changes
/// are reported only after that, and only when the derived state moves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateTracker {
    pause: bool,
    eof: bool,
    buffering: bool,
    idle: bool,
    duration: Option<f64>,
    played: bool,
    ready: bool,
    reported: Option<WidgetState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// State in YouTube player terms.
    pub fn state(&self) -> WidgetState {
        if self.idle || self.duration.is_none() {
            WidgetState::Unstarted
        } else if self.eof {
            WidgetState::Ended
        } else if self.buffering {
            WidgetState::Buffering
        } else if self.pause {
            if self.played {
                WidgetState::Paused
            } else {
                WidgetState::Cued
            }
        } else {
            WidgetState::Playing
        }
    }

    /// Applies one property change and returns the signals it produces.
    pub fn apply(&mut self, name: &str, data: &Value) -> Vec<WidgetSignal> {
        match name {
            "pause" => self.pause = data.as_bool().unwrap_or(false),
            "eof-reached" => self.eof = data.as_bool().unwrap_or(false),
            "paused-for-cache" => self.buffering = data.as_bool().unwrap_or(false),
            "idle-active" => self.idle = data.as_bool().unwrap_or(false),
            "duration" => {
                self.duration = data.as_f64().filter(|duration| *duration > 0.0);
            }
            _ => return Vec::new(),
        }

        let mut signals = Vec::new();
        if !self.ready && self.duration.is_some() {
            self.ready = true;
            debug!(duration = ?self.duration, "mpv reported duration");
            signals.push(WidgetSignal::Ready);
        }

        let state = self.state();
        if state == WidgetState::Playing {
            self.played = true;
        }
        if self.ready && self.reported != Some(state) {
            self.reported = Some(state);
            signals.push(WidgetSignal::StateChanged(state));
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use engine::{WidgetSignal, WidgetState};
    use serde_json::json;

    use super::StateTracker;

    #[test]
    fn ready_fires_once_when_duration_arrives() {
        let mut tracker = StateTracker::new();

        assert!(tracker.apply("pause", &json!(true)).is_empty());
        assert_eq!(
            tracker.apply("duration", &json!(212.0)),
            vec![
                WidgetSignal::Ready,
                WidgetSignal::StateChanged(WidgetState::Cued)
            ]
        );
        assert!(tracker.apply("duration", &json!(212.5)).is_empty());
    }

    #[test]
    fn derives_playing_paused_buffering_and_ended() {
        let mut tracker = StateTracker::new();
        tracker.apply("pause", &json!(true));
        tracker.apply("duration", &json!(60.0));

        assert_eq!(
            tracker.apply("pause", &json!(false)),
            vec![WidgetSignal::StateChanged(WidgetState::Playing)]
        );
        assert_eq!(
            tracker.apply("paused-for-cache", &json!(true)),
            vec![WidgetSignal::StateChanged(WidgetState::Buffering)]
        );
        tracker.apply("paused-for-cache", &json!(false));
        assert_eq!(
            tracker.apply("pause", &json!(true)),
            vec![WidgetSignal::StateChanged(WidgetState::Paused)]
        );
        assert_eq!(
            tracker.apply("eof-reached", &json!(true)),
            vec![WidgetSignal::StateChanged(WidgetState::Ended)]
        );
    }

    #[test]
    fn unknown_properties_are_ignored() {
        let mut tracker = StateTracker::new();

        assert!(tracker.apply("volume", &json!(50)).is_empty());
        assert_eq!(tracker.state(), WidgetState::Unstarted);
    }
}
