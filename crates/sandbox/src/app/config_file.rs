use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use simcore::{ConfigError, CoreConfig, LoopConfig, PoolSettings};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ScenarioConfig {
    pub(crate) frames: u32,
    pub(crate) frame_ms: u64,
    pub(crate) turrets: u32,
    pub(crate) bullet_cap: usize,
    pub(crate) fire_interval_seconds: f32,
    pub(crate) bullet_speed: f32,
    pub(crate) bullet_lifetime_seconds: f32,
    pub(crate) viewport_width: f32,
    pub(crate) viewport_height: f32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            frame_ms: 16,
            turrets: 2,
            bullet_cap: 32,
            fire_interval_seconds: 0.25,
            bullet_speed: 12.0,
            bullet_lifetime_seconds: 1.5,
            viewport_width: 32.0,
            viewport_height: 18.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SandboxConfig {
    #[serde(rename = "loop")]
    pub(crate) loop_config: LoopConfig,
    pub(crate) pools: PoolSettings,
    pub(crate) scenario: ScenarioConfig,
}

impl SandboxConfig {
    pub(crate) fn core(&self) -> CoreConfig {
        CoreConfig {
            loop_config: self.loop_config.clone(),
            pools: self.pools.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// Loads the sandbox config from `path`, or returns defaults when no path is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<SandboxConfig, ConfigLoadError> {
    let config = match path {
        None => SandboxConfig::default(),
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_config_json(&raw).map_err(|message| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                message,
            })?
        }
    };
    config.core().validate()?;
    Ok(config)
}

fn parse_config_json(raw: &str) -> Result<SandboxConfig, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, SandboxConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(source.to_string())
            } else {
                Err(format!("at {path}: {source}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use simcore::ExecutionStrategy;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config, SandboxConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"{
                "loop": { "target_tps": 120, "strategy": "worker_thread" },
                "pools": { "clean_batch_size": 4 },
                "scenario": { "frames": 10, "turrets": 1 }
            }"#,
        );
        let config = load_config(Some(file.path())).expect("load");

        assert_eq!(config.loop_config.target_tps, 120);
        assert_eq!(
            config.loop_config.strategy,
            ExecutionStrategy::WorkerThread
        );
        assert_eq!(config.pools.clean_batch_size, 4);
        assert_eq!(config.scenario.frames, 10);
        assert_eq!(config.scenario.turrets, 1);
        assert_eq!(config.scenario.bullet_cap, 32);
    }

    #[test]
    fn parse_error_names_the_failing_field() {
        let file = write_config(r#"{ "loop": { "strategy": "fibers" } }"#);
        let err = load_config(Some(file.path())).expect_err("bad strategy");
        let message = err.to_string();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
        assert!(message.contains("loop.strategy"), "{message}");
    }

    #[test]
    fn validation_failures_are_reported() {
        let file = write_config(r#"{ "loop": { "velocity_iterations": 0 } }"#);
        let err = load_config(Some(file.path())).expect_err("zero iterations");
        assert!(matches!(
            err,
            ConfigLoadError::Invalid(ConfigError::ZeroIterations { .. })
        ));
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_config(Some(&dir.path().join("absent.json"))).expect_err("missing");
        assert!(matches!(err, ConfigLoadError::Read { .. }));
    }
}
