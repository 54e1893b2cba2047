use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use media_ytdlp::RenderFormat;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::source::SourceRef;
use crate::time::format_timestamp;

/// Output formats a clip can be rendered to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipFormat {
    #[default]
    Mp4,
    Webm,
    Mp3,
    M4a,
    Vorbis,
}

impl ClipFormat {
    pub const ALL: [ClipFormat; 5] = [
        ClipFormat::Mp4,
        ClipFormat::Webm,
        ClipFormat::Mp3,
        ClipFormat::M4a,
        ClipFormat::Vorbis,
    ];

    /// Name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::Mp4 => "Mp4",
            Self::Webm => "Webm",
            Self::Mp3 => "Mp3",
            Self::M4a => "M4a",
            Self::Vorbis => "Vorbis",
        }
    }

    /// Label shown in the format picker.
    pub fn label(self) -> &'static str {
        match self {
            Self::Mp4 => "Video - Mp4",
            Self::Webm => "Video - Webm",
            Self::Mp3 => "Audio - Mp3",
            Self::M4a => "Audio - M4a",
            Self::Vorbis => "Audio - Vorbis",
        }
    }

    /// Name used when the service does not suggest one.
    pub fn default_file_name(self) -> String {
        format!("clip.{}", self.name().to_ascii_lowercase())
    }
}

impl Display for ClipFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClipFormat {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EngineError::UnsupportedFormat {
                value: value.to_owned(),
            })
    }
}

impl From<ClipFormat> for RenderFormat {
    fn from(value: ClipFormat) -> Self {
        match value {
            ClipFormat::Mp4 => Self::Mp4,
            ClipFormat::Webm => Self::Webm,
            ClipFormat::Mp3 => Self::Mp3,
            ClipFormat::M4a => Self::M4a,
            ClipFormat::Vorbis => Self::Vorbis,
        }
    }
}

/// Final range values captured when the user asks for a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRequest {
    pub source_url: String,
    pub video_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub format: ClipFormat,
}

impl ClipRequest {
    /// Captures a request, rejecting an inverted range.
    pub fn new(source: &SourceRef, start_time: f64, end_time: f64, format: ClipFormat) -> Result<Self> {
        if !(start_time.is_finite() && end_time.is_finite()) || start_time > end_time {
            return Err(EngineError::InvertedRange {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            source_url: source.url.clone(),
            video_id: source.video_id.clone(),
            start_time,
            end_time,
            format,
        })
    }

    /// Body sent to the render service.
    ///
    /// # Example
    /// ```
    /// use engine::{ClipFormat, ClipRequest, SourceRef};
    ///
    /// let source = SourceRef::parse("https://youtu.be/dQw4w9WgXcQ").expect("valid url");
    /// let request = ClipRequest::new(&source, 65.0, 3_661.0, ClipFormat::Mp3).expect("ordered range");
    /// let wire = request.to_wire();
    /// assert_eq!(wire.start_time, "01:05");
    /// assert_eq!(wire.end_time, "01:01:01");
    /// assert_eq!(wire.download_format, "Mp3");
    /// ```
    pub fn to_wire(&self) -> WireClipRequest {
        WireClipRequest {
            url: self.source_url.clone(),
            start_time: format_timestamp(self.start_time),
            end_time: format_timestamp(self.end_time),
            download_format: self.format.name().to_owned(),
        }
    }
}

/// JSON body of `POST /download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireClipRequest {
    pub url: String,
    pub start_time: String,
    pub end_time: String,
    pub download_format: String,
}

/// Builds a `Content-Disposition` value carrying `file_name`.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|ch| {
            if ch == ' ' || (ch.is_ascii_graphic() && ch != '"' && ch != '\\') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

/// Extracts a safe file name from a `Content-Disposition` value.
///
/// `filename*=UTF-8''...` wins over `filename=...`. Directory parts are
/// dropped; names that end up empty or refer to a directory yield `None`.
pub fn file_name_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for parameter in header.split(';').map(str::trim) {
        let Some((key, value)) = parameter.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let value = value.trim();
                let Some((charset, rest)) = value.split_once('\'') else {
                    continue;
                };
                let Some((_, encoded)) = rest.split_once('\'') else {
                    continue;
                };
                if charset.eq_ignore_ascii_case("utf-8") {
                    extended = urlencoding::decode(encoded).ok().map(Cow::into_owned);
                }
            }
            "filename" => {
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('"')
                    .and_then(|inner| inner.strip_suffix('"'))
                    .unwrap_or(value);
                plain = Some(unquoted.to_owned());
            }
            _ => {}
        }
    }

    extended.or(plain).and_then(|name| sanitize_file_name(&name))
}

/// Keeps only the final path component of `name`.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(char::from(0));
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_owned())
}
