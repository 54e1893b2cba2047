use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::SourceRef;

/// Identifies one source-to-widget binding. Never reused within an engine.
pub type SessionId = u64;

/// Player state as reported by the widget, using YouTube iframe codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl WidgetState {
    /// Maps a raw player state code; unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
        }
    }
}

/// Asynchronous notifications pushed by a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetSignal {
    /// Fired once, when the duration can be read.
    Ready,
    StateChanged(WidgetState),
    /// The player could not be brought up and will never report ready.
    Failed { reason: String },
}

/// A widget signal tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSignal {
    pub session: SessionId,
    pub signal: WidgetSignal,
}

/// Handle given to a widget so it can push signals back to the engine.
#[derive(Debug, Clone)]
pub struct SignalSink {
    session: SessionId,
    tx: Sender<TaggedSignal>,
}

impl SignalSink {
    pub fn new(session: SessionId, tx: Sender<TaggedSignal>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Sends one signal; returns `false` once the engine is gone.
    pub fn emit(&self, signal: WidgetSignal) -> bool {
        self.tx
            .send(TaggedSignal {
                session: self.session,
                signal,
            })
            .is_ok()
    }
}

/// Imperative operations of an embedded video player.
///
/// Getters are synchronous; commands are fire-and-forget from the caller's
/// point of view, failures are only logged.
pub trait VideoWidget {
    /// Duration in seconds, `0` when unknown.
    fn duration(&mut self) -> Result<f64>;

    fn current_time(&mut self) -> Result<f64>;

    fn player_state(&mut self) -> Result<WidgetState>;

    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}

/// Creates one widget per source reference.
pub trait PlayerBackend {
    type Widget: VideoWidget;

    /// Loads `source` into a fresh widget that reports through `signals`.
    fn open(&mut self, source: &SourceRef, signals: SignalSink) -> Result<Self::Widget>;
}
