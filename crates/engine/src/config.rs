use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clip::ClipFormat;
use crate::error::{EngineError, Result};

const CONFIG_DIR_NAME: &str = "cliptrim";
const CONFIG_FILE_NAME: &str = "config.toml";
const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Where clip requests are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// POST to a render service.
    #[default]
    Http,
    /// Run yt-dlp on this machine.
    Local,
}

/// User configuration read from `config.toml`. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipperConfig {
    pub poll_interval_ms: u64,
    pub render_service_url: String,
    pub output_dir: PathBuf,
    pub default_format: ClipFormat,
    pub dispatch: DispatchMode,
    pub ytdlp_path: PathBuf,
    pub mpv_path: PathBuf,
    pub serve_bind: String,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            render_service_url: "http://localhost:8000".to_owned(),
            output_dir: PathBuf::from("."),
            default_format: ClipFormat::default(),
            dispatch: DispatchMode::default(),
            ytdlp_path: PathBuf::from("yt-dlp"),
            mpv_path: PathBuf::from("mpv"),
            serve_bind: "127.0.0.1:8000".to_owned(),
        }
    }
}

impl ClipperConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file absent, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(EngineError::ConfigSerialize)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| EngineError::ConfigIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, content).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$XDG_CONFIG_HOME/cliptrim/config.toml`, else `~/.config/cliptrim/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .filter(|value| !value.is_empty())
                    .map(|home| PathBuf::from(home).join(".config"))
            })?;
        Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}
