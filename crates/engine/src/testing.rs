//! In-memory widget and backend used by the engine unit tests.

use std::sync::{Arc, Mutex};

use crate::error::{EngineError, Result};
use crate::source::SourceRef;
use crate::widget::{PlayerBackend, SignalSink, VideoWidget, WidgetState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidgetCall {
    SeekTo(f64),
    Play,
    Pause,
    Stop,
}

#[derive(Debug)]
struct MockWidgetState {
    duration: f64,
    current_time: f64,
    state: WidgetState,
    fail_getters: bool,
}

/// Widget double; clones share state and call log.
#[derive(Debug, Clone)]
pub struct MockWidget {
    state: Arc<Mutex<MockWidgetState>>,
    calls: Arc<Mutex<Vec<WidgetCall>>>,
}

impl MockWidget {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockWidgetState {
                duration,
                current_time: 0.0,
                state: WidgetState::Unstarted,
                fail_getters: false,
            })),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<WidgetCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn set_current_time(&self, seconds: f64) {
        self.state.lock().expect("lock widget state").current_time = seconds;
    }

    pub fn set_state(&self, state: WidgetState) {
        self.state.lock().expect("lock widget state").state = state;
    }

    pub fn fail_getters(&self, fail: bool) {
        self.state.lock().expect("lock widget state").fail_getters = fail;
    }

    fn record(&self, call: WidgetCall) {
        self.calls.lock().expect("lock widget calls").push(call);
    }

    fn read<T>(&self, operation: &'static str, get: impl FnOnce(&MockWidgetState) -> T) -> Result<T> {
        let state = self.state.lock().expect("lock widget state");
        if state.fail_getters {
            return Err(EngineError::Widget {
                operation,
                reason: "mock getter failure".to_owned(),
            });
        }
        Ok(get(&state))
    }
}

impl VideoWidget for MockWidget {
    fn duration(&mut self) -> Result<f64> {
        self.read("duration", |state| state.duration)
    }

    fn current_time(&mut self) -> Result<f64> {
        self.read("current_time", |state| state.current_time)
    }

    fn player_state(&mut self) -> Result<WidgetState> {
        self.read("player_state", |state| state.state)
    }

    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) -> Result<()> {
        self.record(WidgetCall::SeekTo(seconds));
        self.set_current_time(seconds);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(WidgetCall::Play);
        self.set_state(WidgetState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(WidgetCall::Pause);
        self.set_state(WidgetState::Paused);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record(WidgetCall::Stop);
        self.set_state(WidgetState::Unstarted);
        Ok(())
    }
}

/// One widget handed out by [`MockBackend`].
#[derive(Debug, Clone)]
pub struct OpenedWidget {
    pub source: SourceRef,
    pub widget: MockWidget,
    pub signals: SignalSink,
}

/// Backend double that records every widget it opens.
#[derive(Debug, Clone)]
pub struct MockBackend {
    duration: f64,
    fail_open: bool,
    opened: Arc<Mutex<Vec<OpenedWidget>>>,
}

impl MockBackend {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            fail_open: false,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new(0.0)
        }
    }

    pub fn opened(&self) -> Arc<Mutex<Vec<OpenedWidget>>> {
        Arc::clone(&self.opened)
    }
}

impl PlayerBackend for MockBackend {
    type Widget = MockWidget;

    fn open(&mut self, source: &SourceRef, signals: SignalSink) -> Result<Self::Widget> {
        if self.fail_open {
            return Err(EngineError::Widget {
                operation: "open",
                reason: "mock backend refused".to_owned(),
            });
        }
        let widget = MockWidget::with_duration(self.duration);
        self.opened
            .lock()
            .expect("lock opened widgets")
            .push(OpenedWidget {
                source: source.clone(),
                widget: widget.clone(),
                signals,
            });
        Ok(widget)
    }
}
