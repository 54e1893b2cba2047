use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, YtDlpError>;

/// Error type for section renders backed by the yt-dlp CLI.
#[derive(Debug)]
pub enum YtDlpError {
    InvalidRequest {
        reason: &'static str,
    },
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    OutputMissing {
        dir: PathBuf,
        extension: &'static str,
        found: Vec<String>,
    },
}

impl Display for YtDlpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest { reason } => write!(f, "invalid render request: {reason}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => {
                write!(
                    f,
                    "Error downloading clip ({status}): {command}; stderr: {}",
                    stderr.trim()
                )
            }
            Self::OutputMissing {
                dir,
                extension,
                found,
            } => {
                write!(
                    f,
                    "clip file not found: no .{extension} file in {} (found: {})",
                    dir.display(),
                    found.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for YtDlpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
