use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use engine::EngineError;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, MpvError>;

/// Errors raised while driving an mpv process.
#[derive(Debug)]
pub enum MpvError {
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    Exited {
        status: std::process::ExitStatus,
    },
    SocketTimeout {
        path: PathBuf,
    },
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    Command {
        command: String,
        error: String,
    },
    ReplyTimeout {
        command: String,
    },
    Disconnected,
    /// The widget was dropped before mpv finished starting.
    Cancelled,
    NotAttached,
    UnexpectedReply {
        property: String,
        value: String,
    },
}

impl Display for MpvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => {
                write!(f, "failed to start {}: {source}", program.display())
            }
            Self::Exited { status } => write!(f, "mpv exited before IPC was ready: {status}"),
            Self::SocketTimeout { path } => {
                write!(f, "mpv IPC socket not ready: {}", path.display())
            }
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Command { command, error } => write!(f, "mpv rejected {command}: {error}"),
            Self::ReplyTimeout { command } => write!(f, "mpv did not answer {command}"),
            Self::Disconnected => write!(f, "mpv IPC connection closed"),
            Self::Cancelled => write!(f, "mpv start cancelled"),
            Self::NotAttached => write!(f, "mpv is still starting"),
            Self::UnexpectedReply { property, value } => {
                write!(f, "unexpected value for {property}: {value}")
            }
        }
    }
}

impl std::error::Error for MpvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl MpvError {
    /// Wraps this error as a widget failure of `operation`.
    pub fn into_widget_error(self, operation: &'static str) -> EngineError {
        EngineError::Widget {
            operation,
            reason: self.to_string(),
        }
    }

    /// True for mpv's answer when a property has no value yet.
    pub(crate) fn is_property_unavailable(&self) -> bool {
        matches!(self, Self::Command { error, .. } if error == "property unavailable")
    }
}
