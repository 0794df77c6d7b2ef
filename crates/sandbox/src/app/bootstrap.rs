use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::config_file::{self, ConfigLoadError, SandboxConfig};

pub(crate) const CONFIG_ENV_VAR: &str = "SIMCORE_CONFIG";
pub(crate) const FRAMES_ENV_VAR: &str = "SANDBOX_FRAMES";

pub(crate) struct AppWiring {
    pub(crate) config: SandboxConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigLoadError> {
    init_tracing();
    info!("=== simcore sandbox startup ===");

    let config_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let mut config = config_file::load_config(config_path.as_deref())?;
    if let Some(frames) = parse_frames_from_env() {
        config.scenario.frames = frames;
    }
    let config_source = config_path
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<defaults>".to_string());
    info!(
        config_source = config_source.as_str(),
        strategy = ?config.loop_config.strategy,
        frames = config.scenario.frames,
        turrets = config.scenario.turrets,
        bullet_cap = config.scenario.bullet_cap,
        "sandbox_config"
    );

    Ok(AppWiring { config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_frames_from_env() -> Option<u32> {
    let raw = std::env::var(FRAMES_ENV_VAR).ok()?;
    parse_frames(&raw).or_else(|| {
        warn!(value = raw.as_str(), "invalid_frame_count_ignored");
        None
    })
}

fn parse_frames(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}
