use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use media_ytdlp::{SectionRequest, YtDlp};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::clip::{ClipRequest, file_name_from_content_disposition, sanitize_file_name};
use crate::config::{ClipperConfig, DispatchMode};
use crate::error::{EngineError, Result};
use crate::time::format_timestamp;

const MAX_UNIQUE_ATTEMPTS: u32 = 1_000;

/// A clip written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedClip {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Turns a clip request into a file on disk.
///
/// Calls block until the clip is saved; hosts run them off the UI thread.
pub trait ClipDispatcher: Send + Sync {
    fn dispatch(&self, request: &ClipRequest) -> Result<SavedClip>;
}

/// Sends requests to a remote render service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClipDispatcher {
    agent: ureq::Agent,
    endpoint: String,
    output_dir: PathBuf,
}

impl HttpClipDispatcher {
    pub fn new(service_url: &str, output_dir: impl Into<PathBuf>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint: format!("{}/download", service_url.trim_end_matches('/')),
            output_dir: output_dir.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ClipDispatcher for HttpClipDispatcher {
    fn dispatch(&self, request: &ClipRequest) -> Result<SavedClip> {
        let wire = request.to_wire();
        let body = serde_json::to_vec(&wire).map_err(|error| EngineError::RenderService {
            status: 0,
            detail: format!("failed to encode request: {error}"),
        })?;

        info!(
            endpoint = %self.endpoint,
            start = %wire.start_time,
            end = %wire.end_time,
            format = %wire.download_format,
            "requesting clip render"
        );
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .send(&body[..])?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.body_mut().read_to_string().unwrap_or_default();
            return Err(EngineError::RenderService {
                status,
                detail: service_detail(&text),
            });
        }

        let file_name = response
            .headers()
            .get("content-disposition")
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_content_disposition)
            .unwrap_or_else(|| request.format.default_file_name());

        let mut reader = response.into_body().into_reader();
        store_clip(&self.output_dir, &file_name, &mut reader)
    }
}

/// Renders clips in-process with yt-dlp.
#[derive(Debug, Clone)]
pub struct LocalClipDispatcher {
    ytdlp: YtDlp,
    output_dir: PathBuf,
}

impl LocalClipDispatcher {
    pub fn new(ytdlp: YtDlp, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp,
            output_dir: output_dir.into(),
        }
    }
}

impl ClipDispatcher for LocalClipDispatcher {
    fn dispatch(&self, request: &ClipRequest) -> Result<SavedClip> {
        let work_dir = tempfile::tempdir().map_err(|source| EngineError::ClipIo {
            context: "failed to create render work directory",
            path: std::env::temp_dir(),
            source,
        })?;
        let start = format_timestamp(request.start_time);
        let end = format_timestamp(request.end_time);

        let rendered = self.ytdlp.render_section(&SectionRequest {
            url: &request.source_url,
            start: &start,
            end: &end,
            format: request.format.into(),
            work_dir: work_dir.path(),
        })?;

        let mut file = File::open(&rendered.path).map_err(|source| EngineError::ClipIo {
            context: "failed to open rendered clip",
            path: rendered.path.clone(),
            source,
        })?;
        store_clip(&self.output_dir, &rendered.file_name, &mut file)
    }
}

/// Builds the dispatcher selected by `config`.
pub fn dispatcher_from_config(config: &ClipperConfig) -> Box<dyn ClipDispatcher> {
    match config.dispatch {
        DispatchMode::Http => Box::new(HttpClipDispatcher::new(
            &config.render_service_url,
            config.output_dir.clone(),
        )),
        DispatchMode::Local => Box::new(LocalClipDispatcher::new(
            YtDlp::new(config.ytdlp_path.clone()),
            config.output_dir.clone(),
        )),
    }
}

/// Streams `reader` into `output_dir` under `file_name`, adding a numeric
/// suffix instead of overwriting an existing file.
pub fn store_clip(output_dir: &Path, file_name: &str, reader: &mut dyn Read) -> Result<SavedClip> {
    let file_name = sanitize_file_name(file_name).ok_or_else(|| EngineError::InvalidClipFileName {
        name: file_name.to_owned(),
    })?;
    std::fs::create_dir_all(output_dir).map_err(|source| EngineError::ClipIo {
        context: "failed to create output directory",
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut staged = NamedTempFile::new_in(output_dir).map_err(|source| EngineError::ClipIo {
        context: "failed to create staging file",
        path: output_dir.to_path_buf(),
        source,
    })?;
    let bytes = io::copy(reader, staged.as_file_mut()).map_err(|source| EngineError::ClipIo {
        context: "failed to write clip",
        path: staged.path().to_path_buf(),
        source,
    })?;

    for attempt in 0..MAX_UNIQUE_ATTEMPTS {
        let candidate = output_dir.join(numbered_file_name(&file_name, attempt));
        match staged.persist_noclobber(&candidate) {
            Ok(_) => {
                info!(path = %candidate.display(), bytes, "clip saved");
                return Ok(SavedClip {
                    path: candidate,
                    bytes,
                });
            }
            Err(error) if error.error.kind() == io::ErrorKind::AlreadyExists => {
                staged = error.file;
            }
            Err(error) => {
                return Err(EngineError::ClipIo {
                    context: "failed to save clip",
                    path: candidate,
                    source: error.error,
                });
            }
        }
    }

    warn!(file_name = %file_name, "no free file name for clip");
    Err(EngineError::ClipIo {
        context: "no free file name for clip",
        path: output_dir.join(&file_name),
        source: io::Error::from(io::ErrorKind::AlreadyExists),
    })
}

/// `clip.mp4`, `clip-1.mp4`, `clip-2.mp4`, ...
fn numbered_file_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_owned();
    }
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}-{attempt}.{extension}"),
        _ => format!("{file_name}-{attempt}"),
    }
}

/// Pulls `detail` out of a JSON error body, falling back to the raw text.
fn service_detail(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "empty response".to_owned(),
        Err(_) => body.trim().to_owned(),
    }
}
