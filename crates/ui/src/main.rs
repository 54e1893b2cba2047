mod app;
mod bridge;
mod widgets;

use app::AppState;
use engine::ClipperConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    init_tracing();
    let config = load_config();

    iced::application("Cliptrim", AppState::update, AppState::view)
        .subscription(AppState::subscription)
        .run_with(move || AppState::boot(config))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config() -> ClipperConfig {
    let Some(path) = ClipperConfig::default_path() else {
        return ClipperConfig::default();
    };
    ClipperConfig::load_or_default(&path).unwrap_or_else(|error| {
        warn!(%error, "falling back to default configuration");
        ClipperConfig::default()
    })
}
