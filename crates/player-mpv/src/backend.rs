use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use engine::{
    ClipperConfig, EngineError, PlayerBackend, SignalSink, SourceRef, VideoWidget, WidgetSignal,
    WidgetState,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{MpvError, Result};
use crate::ipc::IpcConnection;
use crate::tracker::{OBSERVED_PROPERTIES, StateTracker};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const SOCKET_POLL: Duration = Duration::from_millis(50);
const QUIT_GRACE: Duration = Duration::from_millis(500);

type Link = Arc<Mutex<Option<IpcConnection>>>;

/// Opens one mpv process per loaded video.
#[derive(Debug, Clone)]
pub struct MpvBackend {
    program: PathBuf,
    socket_dir: PathBuf,
    extra_args: Vec<String>,
    startup_timeout: Duration,
    reply_timeout: Duration,
}

impl Default for MpvBackend {
    fn default() -> Self {
        Self::new("mpv")
    }
}

impl MpvBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            socket_dir: std::env::temp_dir(),
            extra_args: Vec::new(),
            startup_timeout: STARTUP_TIMEOUT,
            reply_timeout: REPLY_TIMEOUT,
        }
    }

    /// Uses the configured mpv binary and points its ytdl hook at the
    /// configured yt-dlp.
    pub fn from_config(config: &ClipperConfig) -> Self {
        Self::new(config.mpv_path.clone()).with_arg(format!(
            "--script-opts=ytdl_hook-ytdl_path={}",
            config.ytdlp_path.display()
        ))
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Starts mpv and returns at once; attaching happens on a supervisor
    /// thread that reports `Ready` or `Failed` through `signals`.
    fn spawn(&self, source: &SourceRef, signals: SignalSink) -> Result<MpvWidget> {
        fs::create_dir_all(&self.socket_dir).map_err(|source| MpvError::Io {
            context: "create mpv socket directory",
            source,
        })?;
        let socket_path = self.socket_dir.join(format!(
            "cliptrim-mpv-{}-{}.sock",
            std::process::id(),
            signals.session()
        ));
        if socket_path.exists() {
            fs::remove_file(&socket_path).map_err(|source| MpvError::Io {
                context: "remove stale mpv socket",
                source,
            })?;
        }

        let mut command = Command::new(&self.program);
        command
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .args([
                "--pause",
                "--idle=yes",
                "--keep-open=yes",
                "--force-window=yes",
                "--input-terminal=no",
                "--msg-level=all=no",
            ])
            .args(&self.extra_args)
            .arg("--")
            .arg(source.watch_url())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn().map_err(|source| MpvError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        info!(pid = child.id(), video_id = %source.video_id, "mpv started");

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        let mut widget = MpvWidget::unattached();
        widget.shutdown = Some(shutdown_tx);
        let supervisor = Supervisor {
            child,
            socket_path,
            startup_timeout: self.startup_timeout,
            reply_timeout: self.reply_timeout,
            link: Arc::clone(&widget.link),
            tracker: Arc::clone(&widget.tracker),
            signals,
            shutdown: shutdown_rx,
        };
        thread::spawn(move || supervisor.run());

        Ok(widget)
    }
}

impl PlayerBackend for MpvBackend {
    type Widget = MpvWidget;

    fn open(&mut self, source: &SourceRef, signals: SignalSink) -> engine::Result<MpvWidget> {
        self.spawn(source, signals)
            .map_err(|error| error.into_widget_error("open"))
    }
}

/// Owns one mpv process from spawn to exit.
struct Supervisor {
    child: Child,
    socket_path: PathBuf,
    startup_timeout: Duration,
    reply_timeout: Duration,
    link: Link,
    tracker: Arc<Mutex<StateTracker>>,
    signals: SignalSink,
    shutdown: Receiver<()>,
}

impl Supervisor {
    fn run(mut self) {
        let session = self.signals.session();
        match self.start() {
            Ok(()) => {
                // Returns once the widget drops its sender.
                let _ = self.shutdown.recv();
                self.quit();
            }
            Err(MpvError::Cancelled) => debug!(session, "widget dropped while mpv was starting"),
            Err(error) => {
                warn!(session, %error, "mpv failed to start");
                self.signals.emit(WidgetSignal::Failed {
                    reason: error.to_string(),
                });
            }
        }
        stop_child(&mut self.child);
        remove_socket(&self.socket_path);
        debug!(session, "mpv supervisor finished");
    }

    fn start(&mut self) -> Result<()> {
        wait_for_socket(
            &self.socket_path,
            self.startup_timeout,
            &mut self.child,
            &self.shutdown,
        )?;
        connect(
            &self.link,
            &self.tracker,
            &self.socket_path,
            self.signals.clone(),
            self.reply_timeout,
        )
    }

    fn quit(&mut self) {
        let ipc = self.link.lock().ok().and_then(|mut link| link.take());
        if let Some(mut ipc) = ipc
            && let Err(error) = ipc.send(&[json!("quit")])
        {
            debug!(%error, "mpv quit request failed");
        }

        let deadline = Instant::now() + QUIT_GRACE;
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return;
            }
            thread::sleep(SOCKET_POLL);
        }
    }
}

/// Video widget backed by a running mpv instance.
///
/// Calls fail with "still starting" until the IPC link is up; the engine
/// does not issue any before the `Ready` signal. Dropping a widget opened
/// by [`MpvBackend`] hands shutdown to its supervisor thread and returns
/// immediately.
#[derive(Debug)]
pub struct MpvWidget {
    link: Link,
    tracker: Arc<Mutex<StateTracker>>,
    shutdown: Option<Sender<()>>,
}

impl MpvWidget {
    /// Connects to an mpv IPC socket and starts reporting through `signals`.
    pub fn attach(socket_path: &Path, signals: SignalSink, reply_timeout: Duration) -> Result<Self> {
        let widget = Self::unattached();
        connect(
            &widget.link,
            &widget.tracker,
            socket_path,
            signals,
            reply_timeout,
        )?;
        Ok(widget)
    }

    fn unattached() -> Self {
        Self {
            link: Link::default(),
            tracker: Arc::new(Mutex::new(StateTracker::new())),
            shutdown: None,
        }
    }

    fn with_ipc<T>(&self, call: impl FnOnce(&mut IpcConnection) -> Result<T>) -> Result<T> {
        let mut link = self.link.lock().map_err(|_| MpvError::Disconnected)?;
        let ipc = link.as_mut().ok_or(MpvError::NotAttached)?;
        call(ipc)
    }

    /// Reads a time property; mpv reports none until a file is loaded.
    fn time_property(&mut self, name: &str, operation: &'static str) -> engine::Result<f64> {
        match self.with_ipc(|ipc| ipc.get_f64(name)) {
            Ok(seconds) => Ok(seconds),
            Err(error) if error.is_property_unavailable() => Ok(0.0),
            Err(error) => Err(error.into_widget_error(operation)),
        }
    }

    fn run(&mut self, operation: &'static str, args: &[Value]) -> engine::Result<()> {
        self.with_ipc(|ipc| ipc.command(args))
            .map(|_| ())
            .map_err(|error| error.into_widget_error(operation))
    }

    fn set_paused(&mut self, paused: bool, operation: &'static str) -> engine::Result<()> {
        self.with_ipc(|ipc| ipc.set_property("pause", json!(paused)))
            .map_err(|error| error.into_widget_error(operation))
    }
}

impl VideoWidget for MpvWidget {
    fn duration(&mut self) -> engine::Result<f64> {
        self.time_property("duration", "duration")
    }

    fn current_time(&mut self) -> engine::Result<f64> {
        self.time_property("time-pos", "current_time")
    }

    fn player_state(&mut self) -> engine::Result<WidgetState> {
        self.tracker
            .lock()
            .map(|tracker| tracker.state())
            .map_err(|_| EngineError::Widget {
                operation: "player_state",
                reason: "state tracker poisoned".to_owned(),
            })
    }

    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool) -> engine::Result<()> {
        let flags = if allow_seek_ahead {
            "absolute+exact"
        } else {
            "absolute+keyframes"
        };
        self.run("seek_to", &[json!("seek"), json!(seconds), json!(flags)])
    }

    fn play(&mut self) -> engine::Result<()> {
        self.set_paused(false, "play")
    }

    fn pause(&mut self) -> engine::Result<()> {
        self.set_paused(true, "pause")
    }

    fn stop(&mut self) -> engine::Result<()> {
        self.run("stop", &[json!("stop")])
    }
}

impl Drop for MpvWidget {
    fn drop(&mut self) {
        // Owned processes are stopped by their supervisor once the sender is gone.
        if self.shutdown.take().is_some() {
            return;
        }
        if let Err(error) = self.with_ipc(|ipc| ipc.send(&[json!("quit")])) {
            debug!(%error, "mpv quit request failed");
        }
    }
}

/// Connects to `socket_path`, installs the link, then subscribes to the
/// properties that drive `signals`. The link is in place before the first
/// `Ready` can fire.
fn connect(
    link: &Link,
    tracker: &Arc<Mutex<StateTracker>>,
    socket_path: &Path,
    signals: SignalSink,
    reply_timeout: Duration,
) -> Result<()> {
    let observer = Arc::clone(tracker);
    let ipc = IpcConnection::connect(socket_path, reply_timeout, move |name, data| {
        let produced = match observer.lock() {
            Ok(mut tracker) => tracker.apply(name, data),
            Err(_) => return,
        };
        for signal in produced {
            if !signals.emit(signal) {
                debug!(session = signals.session(), "engine gone, dropping mpv signal");
            }
        }
    })?;

    let mut slot = link.lock().map_err(|_| MpvError::Disconnected)?;
    let ipc = slot.insert(ipc);
    let observed = OBSERVED_PROPERTIES
        .into_iter()
        .try_for_each(|(id, name)| ipc.observe_property(id, name));
    if observed.is_err() {
        *slot = None;
    }
    observed
}

fn wait_for_socket(
    path: &Path,
    timeout: Duration,
    child: &mut Child,
    shutdown: &Receiver<()>,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|source| MpvError::Io {
            context: "check mpv status",
            source,
        })? {
            return Err(MpvError::Exited { status });
        }
        if path.exists() && std::os::unix::net::UnixStream::connect(path).is_ok() {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(MpvError::SocketTimeout {
                path: path.to_path_buf(),
            });
        }
        if let Err(RecvTimeoutError::Disconnected) = shutdown.recv_timeout(SOCKET_POLL) {
            return Err(MpvError::Cancelled);
        }
    }
}

fn stop_child(child: &mut Child) {
    if let Err(error) = child.kill()
        && error.kind() != std::io::ErrorKind::InvalidInput
    {
        warn!(%error, "failed to kill mpv");
    }
    let _ = child.wait();
}

fn remove_socket(path: &Path) {
    if path.exists()
        && let Err(error) = fs::remove_file(path)
    {
        warn!(%error, path = %path.display(), "failed to remove mpv socket");
    }
}
