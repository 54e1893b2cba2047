use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine commands, widget calls and clip dispatch.
#[derive(Debug)]
pub enum EngineError {
    NoSource,
    InvertedRange {
        start: f64,
        end: f64,
    },
    InvalidTimestamp {
        text: String,
    },
    UnsupportedFormat {
        value: String,
    },
    Widget {
        operation: &'static str,
        reason: String,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    ConfigSerialize(toml::ser::Error),
    ClipIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    InvalidClipFileName {
        name: String,
    },
    RenderService {
        status: u16,
        detail: String,
    },
    Http(Box<ureq::Error>),
    Render(media_ytdlp::YtDlpError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSource => write!(f, "no valid video source is loaded"),
            Self::InvertedRange { start, end } => {
                write!(f, "trim range is inverted: start {start:.1}s is after end {end:.1}s")
            }
            Self::InvalidTimestamp { text } => {
                write!(f, "invalid timestamp {text:?}, expected MM:SS or HH:MM:SS")
            }
            Self::UnsupportedFormat { value } => write!(f, "unsupported clip format: {value}"),
            Self::Widget { operation, reason } => {
                write!(f, "video widget call {operation} failed: {reason}")
            }
            Self::ConfigIo { path, source } => {
                write!(f, "failed to access config {}: {source}", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            Self::ConfigSerialize(err) => write!(f, "failed to serialize config: {err}"),
            Self::ClipIo {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::InvalidClipFileName { name } => write!(f, "invalid clip file name: {name:?}"),
            Self::RenderService { status, detail } => {
                write!(f, "render service answered {status}: {detail}")
            }
            Self::Http(err) => write!(f, "render request failed: {err}"),
            Self::Render(err) => write!(f, "local render failed: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            Self::ConfigSerialize(err) => Some(err),
            Self::ClipIo { source, .. } => Some(source),
            Self::Http(err) => Some(err.as_ref()),
            Self::Render(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ureq::Error> for EngineError {
    fn from(value: ureq::Error) -> Self {
        Self::Http(Box::new(value))
    }
}

impl From<media_ytdlp::YtDlpError> for EngineError {
    fn from(value: media_ytdlp::YtDlpError) -> Self {
        Self::Render(value)
    }
}
