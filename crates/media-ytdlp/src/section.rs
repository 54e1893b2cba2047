use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info, warn};

use crate::error::{Result, YtDlpError};
use crate::format::{FALLBACK_VIDEO_SELECTOR, Recipe, RenderFormat};
use crate::title::{FALLBACK_TITLE, fetch_title, sanitize_title};

const FORMAT_UNAVAILABLE: &str = "Requested format is not available";

/// One section of a remote video to render into `work_dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRequest<'a> {
    pub url: &'a str,
    /// `MM:SS` or `HH:MM:SS`, passed to yt-dlp as given.
    pub start: &'a str,
    pub end: &'a str,
    pub format: RenderFormat,
    pub work_dir: &'a Path,
}

/// File produced by a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedClip {
    pub path: PathBuf,
    pub file_name: String,
}

/// Handle on a yt-dlp executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlp {
    program: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Title of the video behind `url`, or `"clip"` when it cannot be read.
    pub fn video_title(&self, url: &str) -> String {
        fetch_title(&self.program, url)
    }

    /// Downloads `[start, end]` of the video and converts it to the
    /// requested format.
    ///
    /// Video formats are retried once with a looser selector when yt-dlp
    /// reports the filtered selector unavailable.
    ///
    /// # Example
    /// ```no_run
    /// use std::path::Path;
    /// use media_ytdlp::{RenderFormat, SectionRequest, YtDlp};
    ///
    /// let clip = YtDlp::default()
    ///     .render_section(&SectionRequest {
    ///         url: "https://youtu.be/dQw4w9WgXcQ",
    ///         start: "00:30",
    ///         end: "01:00",
    ///         format: RenderFormat::Mp3,
    ///         work_dir: Path::new("/tmp/render"),
    ///     })
    ///     .expect("render should succeed");
    /// assert!(clip.file_name.ends_with(".mp3"));
    /// ```
    pub fn render_section(&self, request: &SectionRequest<'_>) -> Result<RenderedClip> {
        validate_request(request)?;
        fs::create_dir_all(request.work_dir).map_err(|source| YtDlpError::Io {
            context: "create render work directory",
            source,
        })?;

        let mut stem = sanitize_title(&self.video_title(request.url));
        if stem.is_empty() {
            stem = FALLBACK_TITLE.to_owned();
        }
        let template = request.work_dir.join(format!("{stem}.%(ext)s"));

        info!(
            url = request.url,
            start = request.start,
            end = request.end,
            format = ?request.format,
            "rendering section"
        );
        let mut output = self.run(&section_args(
            request,
            request.format.primary_selector(),
            &template,
        ))?;

        if !output.status.success()
            && !request.format.is_audio()
            && String::from_utf8_lossy(&output.stderr).contains(FORMAT_UNAVAILABLE)
        {
            warn!(
                format = ?request.format,
                "filtered format unavailable, retrying with {FALLBACK_VIDEO_SELECTOR}"
            );
            output = self.run(&section_args(request, FALLBACK_VIDEO_SELECTOR, &template))?;
        }

        if !output.status.success() {
            return Err(YtDlpError::CommandFailed {
                command: command_for_display(&self.program, request),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        find_output(request.work_dir, request.format.extension())
    }

    fn run(&self, args: &[OsString]) -> Result<Output> {
        debug!(program = %self.program.display(), ?args, "running yt-dlp");
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| YtDlpError::Io {
                context: "run yt-dlp section download",
                source,
            })
    }
}

fn validate_request(request: &SectionRequest<'_>) -> Result<()> {
    if request.url.trim().is_empty() {
        return Err(YtDlpError::InvalidRequest {
            reason: "url must not be empty",
        });
    }
    if request.start.trim().is_empty() || request.end.trim().is_empty() {
        return Err(YtDlpError::InvalidRequest {
            reason: "start and end must not be empty",
        });
    }
    Ok(())
}

/// Arguments for one section download using `selector`.
pub(crate) fn section_args(
    request: &SectionRequest<'_>,
    selector: &str,
    template: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--no-part",
        "--restrict-filenames",
        "--format",
        selector,
        "--download-sections",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(format!("*{}-{}", request.start.trim(), request.end.trim()).into());

    match request.format.recipe() {
        Recipe::Video {
            container,
            postprocessor_args,
            ..
        } => {
            for arg in [
                "--merge-output-format",
                container,
                "--recode-video",
                container,
                "--postprocessor-args",
                postprocessor_args,
            ] {
                args.push(arg.into());
            }
        }
        Recipe::Audio { codec } => {
            for arg in ["--extract-audio", "--audio-format", codec] {
                args.push(arg.into());
            }
        }
    }

    args.push("-o".into());
    args.push(template.as_os_str().to_owned());
    args.push("--".into());
    args.push(request.url.into());
    args
}

fn find_output(dir: &Path, extension: &'static str) -> Result<RenderedClip> {
    let entries = fs::read_dir(dir).map_err(|source| YtDlpError::Io {
        context: "list render work directory",
        source,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| YtDlpError::Io {
            context: "read render work directory entry",
            source,
        })?;
        found.push(entry.file_name().to_string_lossy().into_owned());
    }
    found.sort();

    let suffix = format!(".{extension}");
    let Some(file_name) = found.iter().find(|name| name.ends_with(&suffix)).cloned() else {
        return Err(YtDlpError::OutputMissing {
            dir: dir.to_path_buf(),
            extension,
            found,
        });
    };

    Ok(RenderedClip {
        path: dir.join(&file_name),
        file_name,
    })
}

fn command_for_display(program: &Path, request: &SectionRequest<'_>) -> String {
    format!(
        "{} --download-sections *{}-{} {}",
        program.display(),
        request.start,
        request.end,
        request.url
    )
}
