/// Container or audio codec a section is rendered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderFormat {
    Mp4,
    Webm,
    Mp3,
    M4a,
    Vorbis,
}

/// Selector used when the filtered video selector has no match.
pub(crate) const FALLBACK_VIDEO_SELECTOR: &str = "bestvideo+bestaudio/best";

const AUDIO_SELECTOR: &str = "bestaudio/best";

/// How yt-dlp produces one format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recipe {
    Video {
        container: &'static str,
        selector: &'static str,
        postprocessor_args: &'static str,
    },
    Audio {
        codec: &'static str,
    },
}

impl RenderFormat {
    pub fn is_audio(self) -> bool {
        matches!(self, Self::Mp3 | Self::M4a | Self::Vorbis)
    }

    /// Extension of the file yt-dlp writes for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Vorbis => "ogg",
        }
    }

    pub(crate) fn recipe(self) -> Recipe {
        match self {
            Self::Mp4 => Recipe::Video {
                container: "mp4",
                selector: "bestvideo[vcodec!=av01]+bestaudio/best",
                postprocessor_args: "ffmpeg:-c:v libx264 -preset veryfast -crf 23 -c:a aac -strict -2",
            },
            Self::Webm => Recipe::Video {
                container: "webm",
                selector: "bestvideo[ext=webm][vcodec!=av01]+bestaudio/best",
                postprocessor_args: "ffmpeg:-c:v libvpx-vp9 -crf 30 -b:v 0 -c:a libopus",
            },
            Self::Mp3 => Recipe::Audio { codec: "mp3" },
            Self::M4a => Recipe::Audio { codec: "m4a" },
            Self::Vorbis => Recipe::Audio { codec: "vorbis" },
        }
    }

    /// First format selector tried for this format.
    pub(crate) fn primary_selector(self) -> &'static str {
        match self.recipe() {
            Recipe::Video { selector, .. } => selector,
            Recipe::Audio { .. } => AUDIO_SELECTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Recipe, RenderFormat};

    #[test]
    fn vorbis_is_written_as_ogg() {
        assert_eq!(RenderFormat::Vorbis.extension(), "ogg");
        assert_eq!(RenderFormat::Vorbis.recipe(), Recipe::Audio { codec: "vorbis" });
    }

    #[test]
    fn video_selectors_exclude_av1() {
        for format in [RenderFormat::Mp4, RenderFormat::Webm] {
            assert!(!format.is_audio());
            assert!(format.primary_selector().contains("[vcodec!=av01]"));
        }
        assert_eq!(RenderFormat::Mp3.primary_selector(), "bestaudio/best");
    }
}
