use std::fs::File;
use std::io::Read;
use std::thread;

use anyhow::{Result, anyhow};
use engine::clip::content_disposition;
use engine::{ClipFormat, ClipperConfig, EngineError, WireClipRequest, try_parse_timestamp};
use media_ytdlp::{SectionRequest, YtDlp, YtDlpError};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Rendered clip ready to stream back.
#[derive(Debug)]
pub struct Download {
    pub file_name: String,
    pub file: File,
}

/// Error answered as `{"detail": ...}` with `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: u16,
    pub detail: String,
}

impl Failure {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: 400,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: 500,
            detail: detail.into(),
        }
    }
}

/// Serves `POST /download` until the process is stopped.
pub fn run(config: &ClipperConfig, bind: &str) -> Result<()> {
    let server = Server::http(bind).map_err(|error| anyhow!("failed to bind {bind}: {error}"))?;
    let ytdlp = YtDlp::new(config.ytdlp_path.clone());
    info!(%bind, ytdlp = %ytdlp.program().display(), "render service listening");

    for request in server.incoming_requests() {
        let ytdlp = ytdlp.clone();
        thread::spawn(move || respond(&ytdlp, request));
    }
    Ok(())
}

fn respond(ytdlp: &YtDlp, mut request: Request) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or_default().to_owned();
    debug!(%method, %path, "request received");

    let outcome = match (&method, path.as_str()) {
        (Method::Post, "/download") => {
            let mut body = Vec::new();
            match request
                .as_reader()
                .take(MAX_BODY_BYTES)
                .read_to_end(&mut body)
            {
                Ok(_) => handle_download(ytdlp, &body),
                Err(error) => Err(Failure::bad_request(format!(
                    "failed to read request body: {error}"
                ))),
            }
        }
        (_, "/download") => Err(Failure {
            status: 405,
            detail: String::from("method not allowed"),
        }),
        _ => Err(Failure {
            status: 404,
            detail: String::from("not found"),
        }),
    };

    let result = match outcome {
        Ok(download) => {
            info!(%path, file = %download.file_name, "serving clip");
            let mut response = Response::from_file(download.file);
            add_header(&mut response, "Content-Type", "application/octet-stream");
            add_header(
                &mut response,
                "Content-Disposition",
                &content_disposition(&download.file_name),
            );
            request.respond(response)
        }
        Err(failure) => {
            warn!(%path, status = failure.status, detail = %failure.detail, "request failed");
            let body = serde_json::json!({ "detail": failure.detail }).to_string();
            let mut response = Response::from_string(body).with_status_code(StatusCode(failure.status));
            add_header(&mut response, "Content-Type", "application/json");
            request.respond(response)
        }
    };

    if let Err(error) = result {
        warn!(%error, "failed to write response");
    }
}

fn add_header<R: Read>(response: &mut Response<R>, name: &str, value: &str) {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.add_header(header),
        Err(()) => warn!(name, value, "dropping invalid header"),
    }
}

/// Renders the clip described by a JSON request body.
///
/// Malformed bodies, unknown formats and bad times answer 400; failures
/// while rendering answer 500.
pub fn handle_download(ytdlp: &YtDlp, body: &[u8]) -> Result<Download, Failure> {
    let wire: WireClipRequest = serde_json::from_slice(body)
        .map_err(|error| Failure::bad_request(format!("invalid request body: {error}")))?;
    let format: ClipFormat = wire
        .download_format
        .parse()
        .map_err(|error: EngineError| Failure::bad_request(error.to_string()))?;
    let start = checked_time(&wire.start_time)?;
    let end = checked_time(&wire.end_time)?;
    if start > end {
        return Err(Failure::bad_request(
            EngineError::InvertedRange { start, end }.to_string(),
        ));
    }

    let work_dir = tempfile::tempdir()
        .map_err(|error| Failure::internal(format!("failed to create work directory: {error}")))?;
    let clip = ytdlp
        .render_section(&SectionRequest {
            url: &wire.url,
            start: wire.start_time.trim(),
            end: wire.end_time.trim(),
            format: format.into(),
            work_dir: work_dir.path(),
        })
        .map_err(|error| match error {
            YtDlpError::InvalidRequest { .. } => Failure::bad_request(error.to_string()),
            other => Failure::internal(other.to_string()),
        })?;

    // The open handle keeps the data readable after the work directory is removed.
    let file = File::open(&clip.path)
        .map_err(|error| Failure::internal(format!("failed to open rendered clip: {error}")))?;
    Ok(Download {
        file_name: clip.file_name,
        file,
    })
}

fn checked_time(text: &str) -> Result<f64, Failure> {
    try_parse_timestamp(text).ok_or_else(|| {
        Failure::bad_request(
            EngineError::InvalidTimestamp {
                text: text.to_owned(),
            }
            .to_string(),
        )
    })
}
