#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use media_ytdlp::{RenderFormat, SectionRequest, YtDlp, YtDlpError};

/// Writes an executable stand-in for yt-dlp.
///
/// Metadata calls print `title_json`. Download calls append their arguments
/// to `calls.log`, fail with `reject_selector` when it is requested, and
/// otherwise write `<template stem>.<extension>`.
fn fake_ytdlp(dir: &Path, title_json: &str, reject_selector: Option<&str>, extension: &str) -> PathBuf {
    let log = dir.join("calls.log");
    let reject = reject_selector.unwrap_or("");
    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "--dump-single-json" ]; then
  printf '%s' '{title_json}'
  exit 0
fi
echo "$@" >> '{log}'
selector=""
template=""
while [ $# -gt 0 ]; do
  case "$1" in
    --format) selector="$2"; shift ;;
    -o) template="$2"; shift ;;
  esac
  shift
done
if [ -n '{reject}' ] && [ "$selector" = '{reject}' ]; then
  echo "ERROR: Requested format is not available" >&2
  exit 1
fi
printf 'clip' > "${{template%.*}}.{extension}"
"#,
        log = log.display(),
    );

    let path = dir.join("yt-dlp");
    fs::write(&path, script).expect("write fake yt-dlp");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake yt-dlp");
    path
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn renders_section_named_after_sanitized_title() {
    let bin = tempfile::tempdir().expect("bin dir");
    let work = tempfile::tempdir().expect("work dir");
    let program = fake_ytdlp(bin.path(), r#"{"title":"My Video: Live!"}"#, None, "mp3");

    let clip = YtDlp::new(program)
        .render_section(&SectionRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            start: "00:30",
            end: "01:00",
            format: RenderFormat::Mp3,
            work_dir: work.path(),
        })
        .expect("render should succeed");

    assert_eq!(clip.file_name, "My_Video_Live.mp3");
    assert_eq!(clip.path, work.path().join("My_Video_Live.mp3"));
    let calls = calls(bin.path());
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("--download-sections *00:30-01:00"));
    assert!(calls[0].contains("--audio-format mp3"));
}

#[test]
fn unreadable_metadata_falls_back_to_clip_title() {
    let bin = tempfile::tempdir().expect("bin dir");
    let work = tempfile::tempdir().expect("work dir");
    let program = fake_ytdlp(bin.path(), "not json", None, "webm");

    let clip = YtDlp::new(program)
        .render_section(&SectionRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            start: "00:00",
            end: "00:05",
            format: RenderFormat::Webm,
            work_dir: work.path(),
        })
        .expect("render should succeed");

    assert_eq!(clip.file_name, "clip.webm");
}

#[test]
fn unavailable_video_selector_is_retried_without_filter() {
    let bin = tempfile::tempdir().expect("bin dir");
    let work = tempfile::tempdir().expect("work dir");
    let program = fake_ytdlp(
        bin.path(),
        r#"{"title":"t"}"#,
        Some("bestvideo[vcodec!=av01]+bestaudio/best"),
        "mp4",
    );

    let clip = YtDlp::new(program)
        .render_section(&SectionRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            start: "00:10",
            end: "00:20",
            format: RenderFormat::Mp4,
            work_dir: work.path(),
        })
        .expect("fallback render should succeed");

    assert_eq!(clip.file_name, "t.mp4");
    let calls = calls(bin.path());
    assert_eq!(calls.len(), 2);
    assert!(calls[1].contains("--format bestvideo+bestaudio/best"));
}

#[test]
fn failing_download_reports_stderr() {
    let bin = tempfile::tempdir().expect("bin dir");
    let work = tempfile::tempdir().expect("work dir");
    let program = fake_ytdlp(bin.path(), r#"{"title":"t"}"#, Some("bestaudio/best"), "m4a");

    let error = YtDlp::new(program)
        .render_section(&SectionRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            start: "00:10",
            end: "00:20",
            format: RenderFormat::M4a,
            work_dir: work.path(),
        })
        .expect_err("audio formats are not retried");

    let YtDlpError::CommandFailed { stderr, .. } = &error else {
        panic!("expected CommandFailed, got {error:?}");
    };
    assert!(stderr.contains("Requested format is not available"));
    assert_eq!(calls(bin.path()).len(), 1);
}

#[test]
fn missing_output_lists_directory() {
    let bin = tempfile::tempdir().expect("bin dir");
    let work = tempfile::tempdir().expect("work dir");
    let program = fake_ytdlp(bin.path(), r#"{"title":"t"}"#, None, "mp3");

    let error = YtDlp::new(program)
        .render_section(&SectionRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            start: "00:10",
            end: "00:20",
            format: RenderFormat::Vorbis,
            work_dir: work.path(),
        })
        .expect_err("ogg file is never written");

    let YtDlpError::OutputMissing { extension, found, .. } = &error else {
        panic!("expected OutputMissing, got {error:?}");
    };
    assert_eq!(*extension, "ogg");
    assert_eq!(found, &vec!["t.mp3".to_owned()]);
}

#[test]
fn empty_url_is_rejected_before_running() {
    let work = tempfile::tempdir().expect("work dir");

    let error = YtDlp::new("/nonexistent/yt-dlp")
        .render_section(&SectionRequest {
            url: " ",
            start: "00:10",
            end: "00:20",
            format: RenderFormat::Mp4,
            work_dir: work.path(),
        })
        .expect_err("empty url must fail");

    assert!(matches!(error, YtDlpError::InvalidRequest { .. }));
}
