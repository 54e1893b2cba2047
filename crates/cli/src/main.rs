mod render;
mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use engine::{ClipperConfig, SourceRef};
use tracing_subscriber::EnvFilter;

/// Trim sections out of YouTube videos.
#[derive(Debug, Parser)]
#[command(name = "cliptrim", version)]
struct Cli {
    /// Configuration file; defaults to the per-user `cliptrim/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Render one clip and save it to the output directory.
    Render(render::RenderArgs),
    /// Run the HTTP render service.
    Serve {
        /// Address to listen on, overriding `serve_bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the video id found in a URL.
    ParseUrl { url: String },
    /// Print the effective configuration.
    ShowConfig,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        CliCommand::Render(args) => render::run(config, args),
        CliCommand::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.serve_bind.clone());
            serve::run(&config, &bind)
        }
        CliCommand::ParseUrl { url } => {
            let Some(source) = SourceRef::parse(&url) else {
                bail!("no YouTube video id in {url:?}");
            };
            println!("{}", source.video_id);
            println!("{}", source.watch_url());
            Ok(())
        }
        CliCommand::ShowConfig => {
            let text = toml::to_string_pretty(&config).context("failed to encode configuration")?;
            print!("{text}");
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// An explicit `--config` must exist; the default location may be absent.
fn load_config(explicit: Option<&std::path::Path>) -> Result<ClipperConfig> {
    if let Some(path) = explicit {
        return ClipperConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }
    match ClipperConfig::default_path() {
        Some(path) => ClipperConfig::load_or_default(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(ClipperConfig::default()),
    }
}
