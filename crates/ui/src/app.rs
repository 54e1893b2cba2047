use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::TrySendError;
use engine::editors::SLIDER_STEP;
use engine::{
    ClipDispatcher, ClipFormat, ClipRequest, ClipperConfig, Command, EngineErrorEvent,
    EngineErrorKind, Event, PlaybackState, PositionScrubber, RangeSlider, RangeSnapshot,
    SavedClip, SourceRef, TimeFields, dispatcher_from_config,
};
use iced::futures::channel::oneshot;
use iced::widget::{button, canvas, column, container, pick_list, row, slider, text, text_input};
use iced::{Element, Length, Subscription, Task};
use tracing::{info, warn};

use crate::bridge::{BridgeEvent, EngineCommandSender, engine_subscription};
use crate::widgets::range_bar;

/// Entry of the format picker, shown with its long label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChoice(pub ClipFormat);

impl Display for FormatChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.label())
    }
}

const FORMAT_CHOICES: [FormatChoice; 5] = [
    FormatChoice(ClipFormat::Mp4),
    FormatChoice(ClipFormat::Webm),
    FormatChoice(ClipFormat::Mp3),
    FormatChoice(ClipFormat::M4a),
    FormatChoice(ClipFormat::Vorbis),
];

/// UI messages handled by the iced app update loop.
#[derive(Debug, Clone)]
pub enum Message {
    UrlChanged(String),
    RangeDragged(f64, f64),
    RangeCommitted(f64, f64),
    StartTextChanged(String),
    EndTextChanged(String),
    ScrubberDragged(f64),
    ScrubberReleased,
    SkipToStartPressed,
    TogglePlayPressed,
    SkipToEndPressed,
    ToggleLoopPressed,
    FormatPicked(FormatChoice),
    DownloadPressed,
    ClipFinished(Result<SavedClip, EngineErrorEvent>),
    DismissNotice,
    Bridge(BridgeEvent),
}

/// Blocking message that must be dismissed before the user continues.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Notice {
    title: &'static str,
    message: String,
}

/// Root UI state.
pub struct AppState {
    engine_tx: Option<EngineCommandSender>,
    config: ClipperConfig,
    dispatcher: Arc<dyn ClipDispatcher>,
    url: String,
    source: Option<SourceRef>,
    range: RangeSnapshot,
    range_draft: Option<(f64, f64)>,
    position: f64,
    playback: PlaybackState,
    looping: bool,
    slider: RangeSlider,
    fields: TimeFields,
    scrubber: PositionScrubber,
    format: ClipFormat,
    processing: bool,
    notice: Option<Notice>,
    status: String,
    range_cache: canvas::Cache,
}

impl AppState {
    /// Boots the app; the engine bridge starts with the subscription.
    pub fn boot(config: ClipperConfig) -> (Self, Task<Message>) {
        let dispatcher: Arc<dyn ClipDispatcher> = Arc::from(dispatcher_from_config(&config));
        (
            Self::with_parts(None, config, dispatcher, "starting engine bridge"),
            Task::none(),
        )
    }

    fn with_parts(
        engine_tx: Option<EngineCommandSender>,
        config: ClipperConfig,
        dispatcher: Arc<dyn ClipDispatcher>,
        status: &str,
    ) -> Self {
        Self {
            engine_tx,
            format: config.default_format,
            config,
            dispatcher,
            url: String::new(),
            source: None,
            range: RangeSnapshot::default(),
            range_draft: None,
            position: 0.0,
            playback: PlaybackState::default(),
            looping: false,
            slider: RangeSlider::default(),
            fields: TimeFields::default(),
            scrubber: PositionScrubber::new(),
            processing: false,
            notice: None,
            status: status.to_owned(),
            range_cache: canvas::Cache::new(),
        }
    }

    /// Handles one UI message.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::UrlChanged(url) => {
                self.url = url.clone();
                self.send_command(Command::SetSource { url });
            }
            Message::RangeDragged(start, end) => {
                self.range_draft = Some((start, end));
            }
            Message::RangeCommitted(start, end) => {
                self.range_draft = None;
                let (start, end) = self.slider.commit(start, end);
                self.send_command(Command::SetRange { start, end });
            }
            Message::StartTextChanged(text) => {
                if let Some(seconds) = self.fields.start.edit(text) {
                    self.send_command(Command::SetStartTime { seconds });
                }
            }
            Message::EndTextChanged(text) => {
                if let Some(seconds) = self.fields.end.edit(text) {
                    self.send_command(Command::SetEndTime { seconds });
                }
            }
            Message::ScrubberDragged(seconds) => {
                if self.controls_enabled() {
                    self.scrubber.drag(seconds);
                }
            }
            Message::ScrubberReleased => {
                let released = self.scrubber.commit();
                if !self.controls_enabled() {
                    self.scrubber.sync(self.range.duration, self.position);
                } else if let Some(seconds) = released {
                    self.send_command(Command::SeekTo { seconds });
                }
            }
            Message::SkipToStartPressed => {
                self.send_command(Command::SkipToStart);
            }
            Message::TogglePlayPressed => {
                self.send_command(Command::TogglePlay);
            }
            Message::SkipToEndPressed => {
                self.send_command(Command::SkipToEnd);
            }
            Message::ToggleLoopPressed => {
                self.send_command(Command::ToggleLoop);
            }
            Message::FormatPicked(FormatChoice(format)) => {
                self.format = format;
            }
            Message::DownloadPressed => {
                if !self.processing
                    && self.send_command(Command::RequestClip {
                        format: self.format,
                    })
                {
                    self.processing = true;
                    self.status = String::from("preparing clip");
                }
            }
            Message::ClipFinished(Ok(saved)) => {
                self.processing = false;
                info!(path = %saved.path.display(), bytes = saved.bytes, "clip saved");
                self.status = format!("saved {} ({} bytes)", saved.path.display(), saved.bytes);
            }
            Message::ClipFinished(Err(error)) => {
                self.processing = false;
                warn!(message = %error.message, "clip download failed");
                self.notice = Some(Notice {
                    title: "Failed to download",
                    message: error.message,
                });
            }
            Message::DismissNotice => {
                self.notice = None;
            }
            Message::Bridge(BridgeEvent::Ready(sender)) => {
                self.engine_tx = Some(sender);
                self.status = String::from("engine ready");
            }
            Message::Bridge(BridgeEvent::Event(event)) => {
                return self.apply_engine_event(event);
            }
            Message::Bridge(BridgeEvent::Disconnected) => {
                self.status = String::from("engine event channel closed");
                self.engine_tx = None;
                self.processing = false;
            }
        }

        Task::none()
    }

    fn send_command(&mut self, command: Command) -> bool {
        if let Some(sender) = &self.engine_tx {
            match sender.try_send(command) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.status = String::from("engine command queue is full");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.status = String::from("engine command channel closed");
                    self.engine_tx = None;
                    false
                }
            }
        } else {
            self.status = String::from("engine is not ready");
            false
        }
    }

    fn apply_engine_event(&mut self, event: Event) -> Task<Message> {
        match event {
            Event::SourceChanged(source) => {
                self.status = match &source {
                    Some(source) => format!("loading video {}", source.video_id),
                    None => String::from("enter a YouTube URL"),
                };
                self.source = source;
                self.range_draft = None;
            }
            Event::RangeChanged(snapshot) => {
                self.range = snapshot;
                self.slider.set_duration(snapshot.duration);
                self.fields.sync(&snapshot);
                self.scrubber.sync(snapshot.duration, self.position);
            }
            Event::PositionChanged { seconds } => {
                self.position = seconds;
                self.scrubber.sync(self.range.duration, seconds);
            }
            Event::PlaybackChanged(state) => {
                self.playback = state;
            }
            Event::LoopChanged { enabled } => {
                self.looping = enabled;
            }
            Event::ClipRequested(request) => {
                self.status = format!(
                    "rendering {} clip of {}",
                    request.format, request.video_id
                );
                return dispatch_clip(Arc::clone(&self.dispatcher), request);
            }
            Event::Error(error) => self.apply_engine_error(error),
        }

        Task::none()
    }

    fn apply_engine_error(&mut self, error: EngineErrorEvent) {
        match error.kind {
            EngineErrorKind::NoSource | EngineErrorKind::InvertedRange => {
                self.processing = false;
                self.notice = Some(Notice {
                    title: "Cannot create clip",
                    message: error.message,
                });
            }
            EngineErrorKind::Player => {
                self.notice = Some(Notice {
                    title: "Player error",
                    message: error.message,
                });
            }
            _ => {
                self.status = format!("error: {}", error.message);
            }
        }
    }

    fn controls_enabled(&self) -> bool {
        self.source.is_some() && self.notice.is_none()
    }

    /// Renders the UI tree.
    pub fn view(&self) -> Element<'_, Message> {
        let enabled = self.controls_enabled();
        let duration = self.range.duration;
        let handles = self
            .range_draft
            .unwrap_or_else(|| self.slider.handles(&self.range));

        let source_line = match &self.source {
            Some(source) => format!("Video: {}", source.video_id),
            None => String::from("Enter a YouTube URL to load a video"),
        };

        let time_fields = row![
            text_input("Start (MM:SS)", self.fields.start.buffer())
                .on_input_maybe(enabled.then_some(Message::StartTextChanged))
                .width(Length::Fixed(140.0)),
            text_input("End (MM:SS)", self.fields.end.buffer())
                .on_input_maybe(enabled.then_some(Message::EndTextChanged))
                .width(Length::Fixed(140.0)),
        ]
        .spacing(12);

        let scrubber = slider(
            0.0..=duration.max(SLIDER_STEP),
            self.scrubber.value(),
            Message::ScrubberDragged,
        )
        .on_release(Message::ScrubberReleased)
        .step(SLIDER_STEP);

        let play_label = if self.playback == PlaybackState::Playing {
            "Pause"
        } else {
            "Play"
        };
        let loop_label = if self.looping { "Loop: on" } else { "Loop: off" };
        let transport = row![
            button("|<").on_press_maybe(enabled.then_some(Message::SkipToStartPressed)),
            button(play_label).on_press_maybe(enabled.then_some(Message::TogglePlayPressed)),
            button(">|").on_press_maybe(enabled.then_some(Message::SkipToEndPressed)),
            button(loop_label).on_press_maybe(enabled.then_some(Message::ToggleLoopPressed)),
        ]
        .spacing(12);

        let download = row![
            pick_list(
                &FORMAT_CHOICES[..],
                Some(FormatChoice(self.format)),
                Message::FormatPicked
            ),
            button(if self.processing {
                "Processing..."
            } else {
                "Download"
            })
            .on_press_maybe(
                (enabled && !self.processing).then_some(Message::DownloadPressed)
            ),
        ]
        .spacing(12);

        let mut controls = column![
            text_input("YouTube URL", &self.url).on_input(Message::UrlChanged),
            text(source_line),
            range_bar::view(
                duration,
                handles,
                self.position,
                enabled,
                &self.range_cache,
                Message::RangeDragged,
                Message::RangeCommitted,
            ),
            time_fields,
            scrubber,
            text(format!(
                "Current: {:.1}s / {:.1}s",
                self.scrubber.value(),
                duration
            )),
            text(format!("Range: [{:.1}s - {:.1}s]", handles.0, handles.1)),
            transport,
            download,
        ]
        .spacing(12)
        .padding(16);

        if let Some(notice) = &self.notice {
            controls = controls.push(
                container(
                    column![
                        text(notice.title).size(18),
                        text(notice.message.as_str()),
                        button("Dismiss").on_press(Message::DismissNotice),
                    ]
                    .spacing(8),
                )
                .padding(12)
                .style(container::bordered_box),
            );
        }

        controls
            .push(text(format!("Status: {}", self.status)))
            .into()
    }

    /// Subscribes to bridge events emitted by the engine worker thread.
    pub fn subscription(&self) -> Subscription<Message> {
        engine_subscription(&self.config).map(Message::Bridge)
    }

    #[cfg(test)]
    fn from_sender_for_test(
        engine_tx: EngineCommandSender,
        dispatcher: Arc<dyn ClipDispatcher>,
    ) -> Self {
        Self::with_parts(Some(engine_tx), ClipperConfig::default(), dispatcher, "idle")
    }
}

/// Runs the blocking dispatcher on its own thread and reports back as a task.
fn dispatch_clip(dispatcher: Arc<dyn ClipDispatcher>, request: ClipRequest) -> Task<Message> {
    let (result_tx, result_rx) = oneshot::channel();
    thread::spawn(move || {
        let result = dispatcher
            .dispatch(&request)
            .map_err(|error| EngineErrorEvent::from_error(&error));
        let _ = result_tx.send(result);
    });

    Task::perform(
        async move {
            result_rx.await.unwrap_or_else(|_| {
                Err(EngineErrorEvent {
                    kind: EngineErrorKind::Render,
                    message: String::from("render worker stopped"),
                })
            })
        },
        Message::ClipFinished,
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crossbeam_channel::TryRecvError;
    use engine::{
        ClipDispatcher, ClipFormat, ClipRequest, Command, EngineErrorEvent, EngineErrorKind,
        Event, RangeSnapshot, SavedClip, SourceRef,
    };

    use crate::bridge::BridgeEvent;

    use super::{AppState, FormatChoice, Message};

    #[derive(Debug, Default)]
    struct RecordingDispatcher {
        requests: Mutex<Vec<ClipRequest>>,
    }

    impl ClipDispatcher for RecordingDispatcher {
        fn dispatch(&self, request: &ClipRequest) -> engine::Result<SavedClip> {
            self.requests
                .lock()
                .expect("lock requests")
                .push(request.clone());
            Ok(SavedClip {
                path: PathBuf::from("clip.mp4"),
                bytes: 3,
            })
        }
    }

    fn app() -> (
        AppState,
        crossbeam_channel::Receiver<Command>,
        Arc<RecordingDispatcher>,
    ) {
        let (command_tx, command_rx) = crossbeam_channel::bounded(8);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let app = AppState::from_sender_for_test(command_tx, dispatcher.clone());
        (app, command_rx, dispatcher)
    }

    fn source() -> SourceRef {
        SourceRef::parse("https://youtu.be/dQw4w9WgXcQ").expect("valid source")
    }

    fn deliver(app: &mut AppState, event: Event) {
        let _ = app.update(Message::Bridge(BridgeEvent::Event(event)));
    }

    #[test]
    fn url_edit_dispatches_set_source_command() {
        let (mut app, command_rx, _) = app();

        let _ = app.update(Message::UrlChanged("https://youtu.be/dQw4w9WgXcQ".to_owned()));

        let command = command_rx.try_recv().expect("set source command");
        assert_eq!(
            command,
            Command::SetSource {
                url: "https://youtu.be/dQw4w9WgXcQ".to_owned()
            }
        );
    }

    #[test]
    fn valid_start_text_dispatches_and_invalid_text_stays_local() {
        let (mut app, command_rx, _) = app();

        let _ = app.update(Message::StartTextChanged("1:0".to_owned()));
        assert_eq!(
            command_rx.try_recv().expect("set start command"),
            Command::SetStartTime { seconds: 60.0 }
        );

        let _ = app.update(Message::StartTextChanged("1:0x".to_owned()));
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(app.fields.start.buffer(), "1:0x");
    }

    #[test]
    fn model_change_reseeds_time_fields() {
        let (mut app, _command_rx, _) = app();

        deliver(
            &mut app,
            Event::RangeChanged(RangeSnapshot {
                duration: 120.0,
                start_time: 65.0,
                end_time: 120.0,
                end_is_set: false,
            }),
        );

        assert_eq!(app.fields.start.buffer(), "01:05");
        assert_eq!(app.fields.end.buffer(), "02:00");
    }

    #[test]
    fn range_commit_sends_snapped_pair() {
        let (mut app, command_rx, _) = app();
        deliver(
            &mut app,
            Event::RangeChanged(RangeSnapshot {
                duration: 60.0,
                start_time: 0.0,
                end_time: 60.0,
                end_is_set: false,
            }),
        );

        let _ = app.update(Message::RangeDragged(12.34, 60.0));
        assert_eq!(app.range_draft, Some((12.34, 60.0)));
        let _ = app.update(Message::RangeCommitted(12.34, 75.0));

        assert_eq!(app.range_draft, None);
        assert_eq!(
            command_rx.try_recv().expect("set range command"),
            Command::SetRange {
                start: 12.3,
                end: 60.0
            }
        );
    }

    #[test]
    fn scrubber_seeks_only_on_release() {
        let (mut app, command_rx, _) = app();
        deliver(&mut app, Event::SourceChanged(Some(source())));
        deliver(
            &mut app,
            Event::RangeChanged(RangeSnapshot {
                duration: 100.0,
                start_time: 0.0,
                end_time: 100.0,
                end_is_set: false,
            }),
        );

        let _ = app.update(Message::ScrubberDragged(40.0));
        deliver(&mut app, Event::PositionChanged { seconds: 5.0 });
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(app.scrubber.value(), 40.0);

        let _ = app.update(Message::ScrubberReleased);

        assert_eq!(
            command_rx.try_recv().expect("seek command"),
            Command::SeekTo { seconds: 40.0 }
        );
    }

    #[test]
    fn scrubber_follows_corrected_position_after_release() {
        let (mut app, command_rx, _) = app();
        deliver(&mut app, Event::SourceChanged(Some(source())));
        deliver(
            &mut app,
            Event::RangeChanged(RangeSnapshot {
                duration: 100.0,
                start_time: 30.0,
                end_time: 60.0,
                end_is_set: true,
            }),
        );
        deliver(&mut app, Event::PositionChanged { seconds: 30.0 });

        let _ = app.update(Message::ScrubberDragged(90.0));
        let _ = app.update(Message::ScrubberReleased);
        assert_eq!(
            command_rx.try_recv().expect("seek command"),
            Command::SeekTo { seconds: 90.0 }
        );
        deliver(&mut app, Event::PositionChanged { seconds: 30.0 });

        assert_eq!(app.scrubber.value(), 30.0);
        assert!(!app.scrubber.is_dragging());
    }

    #[test]
    fn scrubber_is_inert_without_source() {
        let (mut app, command_rx, _) = app();
        deliver(
            &mut app,
            Event::RangeChanged(RangeSnapshot {
                duration: 100.0,
                start_time: 0.0,
                end_time: 100.0,
                end_is_set: false,
            }),
        );

        let _ = app.update(Message::ScrubberDragged(40.0));
        let _ = app.update(Message::ScrubberReleased);

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(app.scrubber.value(), 0.0);
        assert!(!app.scrubber.is_dragging());
    }

    #[test]
    fn download_requests_clip_in_picked_format() {
        let (mut app, command_rx, _) = app();
        deliver(&mut app, Event::SourceChanged(Some(source())));

        let _ = app.update(Message::FormatPicked(FormatChoice(ClipFormat::Mp3)));
        let _ = app.update(Message::DownloadPressed);
        let _ = app.update(Message::DownloadPressed);

        assert_eq!(
            command_rx.try_recv().expect("request clip command"),
            Command::RequestClip {
                format: ClipFormat::Mp3
            }
        );
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(app.processing);
    }

    #[test]
    fn clip_requested_event_runs_dispatcher() {
        let (mut app, _command_rx, dispatcher) = app();
        let request =
            ClipRequest::new(&source(), 10.0, 20.0, ClipFormat::Mp4).expect("clip request");

        deliver(&mut app, Event::ClipRequested(request.clone()));

        let deadline = Instant::now() + Duration::from_secs(1);
        while dispatcher.requests.lock().expect("lock requests").is_empty()
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            *dispatcher.requests.lock().expect("lock requests"),
            vec![request]
        );
    }

    #[test]
    fn rejected_request_shows_blocking_notice_until_dismissed() {
        let (mut app, _command_rx, _) = app();
        deliver(&mut app, Event::SourceChanged(Some(source())));
        let _ = app.update(Message::DownloadPressed);

        deliver(
            &mut app,
            Event::Error(EngineErrorEvent {
                kind: EngineErrorKind::InvertedRange,
                message: "start 80 lies after end 20".to_owned(),
            }),
        );

        assert!(!app.processing);
        assert!(app.notice.is_some());
        assert!(!app.controls_enabled());

        let _ = app.update(Message::DismissNotice);

        assert!(app.notice.is_none());
        assert!(app.controls_enabled());
    }

    #[test]
    fn failed_download_raises_notice() {
        let (mut app, _command_rx, _) = app();
        app.processing = true;

        let _ = app.update(Message::ClipFinished(Err(EngineErrorEvent {
            kind: EngineErrorKind::Render,
            message: "render service answered 500: boom".to_owned(),
        })));

        assert!(!app.processing);
        let notice = app.notice.as_ref().expect("notice");
        assert_eq!(notice.title, "Failed to download");
        assert!(notice.message.contains("boom"));
    }

    #[test]
    fn cleared_source_disables_controls() {
        let (mut app, _command_rx, _) = app();
        deliver(&mut app, Event::SourceChanged(Some(source())));
        assert!(app.controls_enabled());

        deliver(&mut app, Event::SourceChanged(None));

        assert!(!app.controls_enabled());
    }
}
