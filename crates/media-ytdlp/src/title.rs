use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

/// Title used when metadata cannot be read.
pub const FALLBACK_TITLE: &str = "clip";

const MAX_TITLE_CHARS: usize = 60;

/// Reads the video title with `--dump-single-json`, falling back to
/// [`FALLBACK_TITLE`] on any failure.
pub(crate) fn fetch_title(program: &Path, url: &str) -> String {
    let output = match Command::new(program)
        .arg("--dump-single-json")
        .arg("--")
        .arg(url)
        .output()
    {
        Ok(output) => output,
        Err(error) => {
            warn!(%error, program = %program.display(), "failed to run yt-dlp for metadata");
            return FALLBACK_TITLE.to_owned();
        }
    };

    if !output.status.success() {
        debug!(status = %output.status, "metadata lookup failed, using fallback title");
        return FALLBACK_TITLE.to_owned();
    }

    serde_json::from_slice::<serde_json::Value>(&output.stdout)
        .ok()
        .and_then(|metadata| metadata.get("title")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| FALLBACK_TITLE.to_owned())
}

/// Turns a video title into a file stem.
///
/// Drops everything except word characters, whitespace and `-()[]`, joins
/// whitespace runs with `_`, and keeps at most 60 characters.
///
/// # Example
/// ```
/// use media_ytdlp::sanitize_title;
///
/// assert_eq!(sanitize_title("Rick Astley - Never Gonna Give You Up!"), "Rick_Astley_-_Never_Gonna_Give_You_Up");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|ch| {
            ch.is_alphanumeric() || *ch == '_' || ch.is_whitespace() || "-()[]".contains(*ch)
        })
        .collect();

    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let mut stem = String::with_capacity(joined.len());
    if kept.starts_with(char::is_whitespace) && !joined.is_empty() {
        stem.push('_');
    }
    stem.push_str(&joined);
    if kept.ends_with(char::is_whitespace) && !joined.is_empty() {
        stem.push('_');
    }

    stem.chars().take(MAX_TITLE_CHARS).collect()
}
