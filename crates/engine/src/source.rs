use serde::{Deserialize, Serialize};

const VIDEO_ID_LEN: usize = 11;

/// A pasted video URL together with its canonical 11-character video id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub video_id: String,
}

impl SourceRef {
    /// Builds a source reference when `url` contains a recognizable video id.
    ///
    /// # Example
    /// ```
    /// use engine::SourceRef;
    ///
    /// let source = SourceRef::parse("https://youtu.be/dQw4w9WgXcQ").expect("valid url");
    /// assert_eq!(source.video_id, "dQw4w9WgXcQ");
    /// assert!(SourceRef::parse("not a url").is_none());
    /// ```
    pub fn parse(url: &str) -> Option<Self> {
        let video_id = extract_video_id(url)?;
        Some(Self {
            url: url.trim().to_owned(),
            video_id: video_id.to_owned(),
        })
    }

    /// Canonical watch URL handed to players.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    ShortHost,
    V,
    UserPath,
    Embed,
    Watch,
}

const MARKERS: [Marker; 5] = [
    Marker::ShortHost,
    Marker::V,
    Marker::UserPath,
    Marker::Embed,
    Marker::Watch,
];

impl Marker {
    /// Returns the byte length of the marker when it matches at `at`.
    fn match_len(self, text: &str, at: usize) -> Option<usize> {
        let rest = &text[at..];
        match self {
            Self::ShortHost => {
                let tail = rest.strip_prefix("youtu")?;
                let any = tail.chars().next()?;
                tail[any.len_utf8()..]
                    .starts_with("be/")
                    .then_some(5 + any.len_utf8() + 3)
            }
            Self::V => rest.starts_with("v/").then_some(2),
            Self::UserPath => {
                let bytes = rest.as_bytes();
                let matched = bytes.len() >= 5
                    && bytes.starts_with(b"/u/")
                    && (bytes[3].is_ascii_alphanumeric() || bytes[3] == b'_')
                    && bytes[4] == b'/';
                matched.then_some(5)
            }
            Self::Embed => rest.starts_with("embed/").then_some(6),
            Self::Watch => rest.starts_with("watch?").then_some(6),
        }
    }
}

/// Extracts the 11-character video id from the usual YouTube URL shapes.
///
/// Recognized shapes are `watch?v=`, `youtu.be/`, `/v/`, `/embed/` and
/// `/u/<w>/`. When several markers occur, the last one wins. Anything else
/// yields `None`.
pub fn extract_video_id(url: &str) -> Option<&str> {
    let text = url.trim();
    let text = text.lines().next().unwrap_or_default();

    let mut best: Option<(usize, usize)> = None;
    for (at, _) in text.char_indices() {
        for marker in MARKERS {
            if let Some(len) = marker.match_len(text, at) {
                if best.is_none_or(|(start, _)| at > start) {
                    best = Some((at, at + len));
                }
                break;
            }
        }
    }

    let (_, marker_end) = best?;
    let mut rest = &text[marker_end..];
    rest = rest.strip_prefix('?').unwrap_or(rest);
    rest = rest.strip_prefix('v').unwrap_or(rest);
    rest = rest.strip_prefix('=').unwrap_or(rest);

    let id_end = rest
        .find(|ch: char| matches!(ch, '#' | '&' | '?'))
        .unwrap_or(rest.len());
    let id = &rest[..id_end];

    (id.chars().count() == VIDEO_ID_LEN).then_some(id)
}
