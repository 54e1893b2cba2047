use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use engine::{
    ClipFormat, ClipRequest, ClipperConfig, DispatchMode, EngineError, SourceRef,
    dispatcher_from_config, try_parse_timestamp,
};
use tracing::info;

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// URL of the source video.
    pub url: String,

    /// Range start, `MM:SS` or `HH:MM:SS`.
    #[arg(long, default_value = "00:00")]
    pub start: String,

    /// Range end, `MM:SS` or `HH:MM:SS`.
    #[arg(long)]
    pub end: String,

    /// Output format; defaults to `default_format` from the configuration.
    #[arg(long)]
    pub format: Option<ClipFormat>,

    /// Run yt-dlp on this machine instead of calling the render service.
    #[arg(long)]
    pub local: bool,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

pub fn run(mut config: ClipperConfig, args: RenderArgs) -> Result<()> {
    let request = request_from_args(&args, config.default_format)?;

    if args.local {
        config.dispatch = DispatchMode::Local;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    info!(
        video_id = %request.video_id,
        dispatch = ?config.dispatch,
        output_dir = %config.output_dir.display(),
        "rendering clip"
    );
    let saved = dispatcher_from_config(&config)
        .dispatch(&request)
        .context("failed to download clip")?;

    println!("{} ({} bytes)", saved.path.display(), saved.bytes);
    Ok(())
}

fn request_from_args(args: &RenderArgs, default_format: ClipFormat) -> Result<ClipRequest> {
    let source = SourceRef::parse(&args.url)
        .with_context(|| format!("no YouTube video id in {:?}", args.url))?;
    let start = parse_time(&args.start)?;
    let end = parse_time(&args.end)?;

    Ok(ClipRequest::new(
        &source,
        start,
        end,
        args.format.unwrap_or(default_format),
    )?)
}

fn parse_time(text: &str) -> Result<f64, EngineError> {
    try_parse_timestamp(text).ok_or_else(|| EngineError::InvalidTimestamp {
        text: text.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use engine::{ClipFormat, EngineError};

    use super::{RenderArgs, request_from_args};

    fn args(url: &str, start: &str, end: &str) -> RenderArgs {
        RenderArgs {
            url: url.to_owned(),
            start: start.to_owned(),
            end: end.to_owned(),
            format: None,
            local: false,
            output_dir: None,
        }
    }

    #[test]
    fn builds_request_with_default_format() {
        let request = request_from_args(
            &args("https://youtu.be/dQw4w9WgXcQ", "0:30", "1:00"),
            ClipFormat::Webm,
        )
        .expect("valid arguments");

        assert_eq!(request.video_id, "dQw4w9WgXcQ");
        assert_eq!(request.start_time, 30.0);
        assert_eq!(request.end_time, 60.0);
        assert_eq!(request.format, ClipFormat::Webm);
    }

    #[test]
    fn rejects_url_without_video_id() {
        let error = request_from_args(&args("not a url", "0:00", "0:10"), ClipFormat::Mp4)
            .expect_err("url without id must fail");

        assert!(error.to_string().contains("no YouTube video id"));
    }

    #[test]
    fn rejects_malformed_time() {
        let error = request_from_args(
            &args("https://youtu.be/dQw4w9WgXcQ", "0:30", "soon"),
            ClipFormat::Mp4,
        )
        .expect_err("malformed end must fail");

        assert!(matches!(
            error.downcast_ref::<EngineError>(),
            Some(EngineError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let error = request_from_args(
            &args("https://youtu.be/dQw4w9WgXcQ", "1:00", "0:30"),
            ClipFormat::Mp4,
        )
        .expect_err("inverted range must fail");

        assert!(matches!(
            error.downcast_ref::<EngineError>(),
            Some(EngineError::InvertedRange { .. })
        ));
    }
}
