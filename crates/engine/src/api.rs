use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::clip::{ClipFormat, ClipRequest};
use crate::config::ClipperConfig;
use crate::error::{EngineError, Result};
use crate::playback::{DEFAULT_POLL_INTERVAL, PlaybackState};
use crate::range::RangeSnapshot;
use crate::session::Session;
use crate::source::SourceRef;
use crate::widget::{PlayerBackend, SessionId, SignalSink, TaggedSignal, WidgetSignal};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replaces the loaded video with the one referenced by `url`.
    ///
    /// Text that carries no video id clears the session and leaves every
    /// control disabled. Text naming the video already loaded keeps the
    /// current session.
    ///
    /// # Example
    /// ```ignore
    /// use engine::{Command, Engine};
    ///
    /// let mut engine = Engine::new(backend);
    /// let events = engine.handle_command(Command::SetSource {
    ///     url: "https://youtu.be/dQw4w9WgXcQ".to_owned(),
    /// })?;
    /// ```
    SetSource {
        url: String,
    },
    SetStartTime {
        seconds: f64,
    },
    SetEndTime {
        seconds: f64,
    },
    /// Sets both ends at once, as the slider commits them.
    SetRange {
        start: f64,
        end: f64,
    },
    /// Seeks the widget, then pulls the position back to the range start when
    /// it landed outside the range.
    SeekTo {
        seconds: f64,
    },
    SkipToStart,
    SkipToEnd,
    TogglePlay,
    ToggleLoop,
    /// Captures the current range as a clip request.
    ///
    /// Fails with `NoSource` when nothing is loaded and with `InvertedRange`
    /// when start lies after end.
    RequestClip {
        format: ClipFormat,
    },
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SourceChanged(Option<SourceRef>),
    RangeChanged(RangeSnapshot),
    PositionChanged { seconds: f64 },
    PlaybackChanged(PlaybackState),
    LoopChanged { enabled: bool },
    ClipRequested(ClipRequest),
    Error(EngineErrorEvent),
}

/// Coarse classification of an engine error for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    NoSource,
    InvertedRange,
    Player,
    Render,
    Config,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::NoSource => Self::NoSource,
            EngineError::InvertedRange { .. } => Self::InvertedRange,
            EngineError::Widget { .. } => Self::Player,
            EngineError::RenderService { .. }
            | EngineError::Http(_)
            | EngineError::Render(_)
            | EngineError::ClipIo { .. }
            | EngineError::InvalidClipFileName { .. } => Self::Render,
            EngineError::ConfigIo { .. }
            | EngineError::ConfigParse { .. }
            | EngineError::ConfigSerialize(_) => Self::Config,
            EngineError::InvalidTimestamp { .. } | EngineError::UnsupportedFormat { .. } => {
                Self::Other
            }
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Everything an event can report, captured before and after a step.
#[derive(Debug, Clone, PartialEq)]
struct Observed {
    source: Option<SourceRef>,
    range: RangeSnapshot,
    position: f64,
    playback: PlaybackState,
    looping: bool,
}

impl Observed {
    fn changes_since(&self, before: &Observed) -> Vec<Event> {
        let mut events = Vec::new();
        if self.source != before.source {
            events.push(Event::SourceChanged(self.source.clone()));
        }
        if self.range != before.range {
            events.push(Event::RangeChanged(self.range));
        }
        if self.position != before.position {
            events.push(Event::PositionChanged {
                seconds: self.position,
            });
        }
        if self.playback != before.playback {
            events.push(Event::PlaybackChanged(self.playback));
        }
        if self.looping != before.looping {
            events.push(Event::LoopChanged {
                enabled: self.looping,
            });
        }
        events
    }

    /// Full state, reported after a source change.
    fn all_events(&self) -> Vec<Event> {
        vec![
            Event::SourceChanged(self.source.clone()),
            Event::RangeChanged(self.range),
            Event::PositionChanged {
                seconds: self.position,
            },
            Event::PlaybackChanged(self.playback),
        ]
    }
}

/// Range and playback controller for one embedded player.
///
/// All state is mutated by the thread owning the engine. Widget signals
/// arrive through [`Engine::signals`] and are fed back with
/// [`Engine::handle_signal`]; polling runs through [`Engine::poll_tick`]
/// whenever [`Engine::poll_deadline`] is due.
pub struct Engine<B>
where
    B: PlayerBackend,
{
    backend: B,
    session: Option<Session<B::Widget>>,
    source_text: String,
    next_session_id: SessionId,
    looping: bool,
    poll_interval: Duration,
    signal_tx: Sender<TaggedSignal>,
    signal_rx: Receiver<TaggedSignal>,
}

impl<B> std::fmt::Debug for Engine<B>
where
    B: PlayerBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session", &self.session_id())
            .field("source_text", &self.source_text)
            .field("looping", &self.looping)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<B> Engine<B>
where
    B: PlayerBackend,
{
    /// Creates an engine polling at the default cadence.
    pub fn new(backend: B) -> Self {
        Self::with_poll_interval(backend, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(backend: B, poll_interval: Duration) -> Self {
        let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            session: None,
            source_text: String::new(),
            next_session_id: 1,
            looping: false,
            poll_interval,
            signal_tx,
            signal_rx,
        }
    }

    pub fn with_config(backend: B, config: &ClipperConfig) -> Self {
        Self::with_poll_interval(backend, config.poll_interval())
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::SetSource { url } => Ok(self.set_source(url)),
            Command::SetStartTime { seconds } => Ok(self.edit_range(Some(seconds), None)),
            Command::SetEndTime { seconds } => Ok(self.edit_range(None, Some(seconds))),
            Command::SetRange { start, end } => Ok(self.edit_range(Some(start), Some(end))),
            Command::SeekTo { seconds } => Ok(self.seek_to(seconds)),
            Command::SkipToStart => Ok(self.reposition(|session| {
                let (range, adapter) = session.parts();
                adapter.skip_to_start(range);
            })),
            Command::SkipToEnd => Ok(self.reposition(|session| {
                let (range, adapter) = session.parts();
                adapter.skip_to_end(range);
            })),
            Command::TogglePlay => Ok(self.step(|session| session.adapter.toggle_play())),
            Command::ToggleLoop => Ok(self.toggle_loop()),
            Command::RequestClip { format } => self.request_clip(format),
        }
    }

    /// Applies one widget signal. Signals from replaced sessions are dropped.
    pub fn handle_signal(&mut self, tagged: TaggedSignal) -> Vec<Event> {
        if self.session_id() != Some(tagged.session) {
            debug!(
                session = tagged.session,
                current = ?self.session_id(),
                signal = ?tagged.signal,
                "dropping signal from stale session"
            );
            return Vec::new();
        }

        let state = match tagged.signal {
            WidgetSignal::Ready => None,
            WidgetSignal::StateChanged(state) => Some(state),
            WidgetSignal::Failed { reason } => {
                warn!(session = tagged.session, %reason, "player failed to start");
                let error = EngineError::Widget {
                    operation: "open",
                    reason,
                };
                return vec![Event::Error(EngineErrorEvent::from_error(&error))];
            }
        };

        self.step(|session| {
            let (range, adapter) = session.parts();
            match state {
                None => adapter.on_ready(range),
                Some(state) => adapter.on_state_change(state),
            }
        })
    }

    /// Runs one polling step if the current session is playing.
    pub fn poll_tick(&mut self) -> Vec<Event> {
        self.step(|session| {
            let (range, adapter) = session.parts();
            adapter.poll_tick(range);
        })
    }

    /// When the next poll tick is due; `None` while not playing.
    pub fn poll_deadline(&self) -> Option<Instant> {
        self.session
            .as_ref()
            .and_then(|session| session.adapter.poll_deadline())
    }

    /// Receiver of widget signals for the thread driving this engine.
    pub fn signals(&self) -> Receiver<TaggedSignal> {
        self.signal_rx.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(Session::id)
    }

    pub fn source(&self) -> Option<&SourceRef> {
        self.session.as_ref().map(Session::source)
    }

    pub fn range_snapshot(&self) -> RangeSnapshot {
        self.observe().range
    }

    pub fn current_position(&self) -> f64 {
        self.observe().position
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.observe().playback
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_source(&mut self, url: String) -> Vec<Event> {
        if url == self.source_text {
            return Vec::new();
        }
        self.source_text = url;
        let parsed = SourceRef::parse(&self.source_text);

        if let (Some(parsed), Some(session)) = (&parsed, self.session.as_mut())
            && parsed.video_id == session.source().video_id
        {
            debug!(video_id = %parsed.video_id, "source text changed, same video");
            session.retarget(parsed.clone());
            return Vec::new();
        }

        if let Some(previous) = self.session.take() {
            previous.close();
        }

        let Some(source) = parsed else {
            debug!(text = %self.source_text, "no video id in source text");
            return self.observe().all_events();
        };

        let id = self.next_session_id;
        self.next_session_id += 1;
        let sink = SignalSink::new(id, self.signal_tx.clone());

        match self.backend.open(&source, sink) {
            Ok(widget) => {
                info!(session = id, video_id = %source.video_id, "source loaded");
                self.session = Some(Session::new(
                    id,
                    source,
                    widget,
                    self.poll_interval,
                    self.looping,
                ));
                self.observe().all_events()
            }
            Err(error) => {
                warn!(%error, video_id = %source.video_id, "failed to open player");
                let mut events = self.observe().all_events();
                events.push(Event::Error(EngineErrorEvent::from_error(&error)));
                events
            }
        }
    }

    fn edit_range(&mut self, start: Option<f64>, end: Option<f64>) -> Vec<Event> {
        let valid = |value: Option<f64>| value.is_none_or(f64::is_finite);
        if !valid(start) || !valid(end) {
            debug!(?start, ?end, "ignoring non-finite range edit");
            return Vec::new();
        }

        self.step(|session| {
            let (range, adapter) = session.parts();
            if let Some(start) = start {
                range.set_start_time(start);
            }
            if let Some(end) = end {
                range.set_end_time(end);
            }
            adapter.enforce_range(range);
        })
    }

    fn seek_to(&mut self, seconds: f64) -> Vec<Event> {
        if !seconds.is_finite() {
            return Vec::new();
        }
        self.reposition(|session| {
            let (range, adapter) = session.parts();
            adapter.seek(range, seconds);
        })
    }

    fn toggle_loop(&mut self) -> Vec<Event> {
        let before = self.observe();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.adapter.toggle_loop();
        self.looping = session.adapter.is_looping();
        info!(enabled = self.looping, "loop toggled");
        self.observe().changes_since(&before)
    }

    fn request_clip(&mut self, format: ClipFormat) -> Result<Vec<Event>> {
        let session = self.session.as_ref().ok_or(EngineError::NoSource)?;
        let range = &session.range;
        let request =
            ClipRequest::new(session.source(), range.start_time(), range.end_time(), format)?;
        info!(
            video_id = %request.video_id,
            start = request.start_time,
            end = request.end_time,
            format = %format,
            "clip requested"
        );
        Ok(vec![Event::ClipRequested(request)])
    }

    /// Runs `apply` against the current session and reports what changed.
    fn step(&mut self, apply: impl FnOnce(&mut Session<B::Widget>)) -> Vec<Event> {
        let before = self.observe();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        apply(session);
        self.observe().changes_since(&before)
    }

    /// Like [`Engine::step`], but a bound session always reports where the
    /// player ended up, even when a corrective seek lands on the old position.
    fn reposition(&mut self, apply: impl FnOnce(&mut Session<B::Widget>)) -> Vec<Event> {
        let mut events = self.step(apply);
        let bound = self
            .session
            .as_ref()
            .is_some_and(|session| session.adapter.is_bound());
        if bound
            && !events
                .iter()
                .any(|event| matches!(event, Event::PositionChanged { .. }))
        {
            events.push(Event::PositionChanged {
                seconds: self.current_position(),
            });
        }
        events
    }

    fn observe(&self) -> Observed {
        match self.session.as_ref() {
            Some(session) => Observed {
                source: Some(session.source().clone()),
                range: session.range.snapshot(),
                position: session.range.current_position(),
                playback: session.adapter.state(),
                looping: self.looping,
            },
            None => Observed {
                source: None,
                range: RangeSnapshot::default(),
                position: 0.0,
                playback: PlaybackState::Stopped,
                looping: self.looping,
            },
        }
    }
}
