//! Serializable settings for the frame drivers and the projectile registry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::{FixedStepper, DEFAULT_MAX_FRAME_DELTA};

const DEFAULT_METRICS_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Simulation steps run on the caller's thread inside `advance`.
    #[default]
    Cooperative,
    /// A dedicated worker drains the accumulator while the caller waits.
    WorkerThread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta_ms: u64,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub strategy: ExecutionStrategy,
    pub metrics_log_interval_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta_ms: DEFAULT_MAX_FRAME_DELTA.as_millis() as u64,
            velocity_iterations: 8,
            position_iterations: 3,
            strategy: ExecutionStrategy::Cooperative,
            metrics_log_interval_ms: DEFAULT_METRICS_LOG_INTERVAL.as_millis() as u64,
        }
    }
}

impl LoopConfig {
    pub fn target_tps(&self) -> u32 {
        self.target_tps.max(1)
    }

    pub fn fixed_step(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps() as f64)
    }

    pub fn max_frame_delta(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.max_frame_delta_ms),
            DEFAULT_MAX_FRAME_DELTA,
        )
    }

    pub fn metrics_log_interval(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.metrics_log_interval_ms),
            DEFAULT_METRICS_LOG_INTERVAL,
        )
    }

    pub fn stepper(&self) -> FixedStepper {
        FixedStepper::new(self.fixed_step(), self.max_frame_delta())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.velocity_iterations == 0 {
            return Err(ConfigError::ZeroIterations {
                field: "velocity_iterations",
            });
        }
        if self.position_iterations == 0 {
            return Err(ConfigError::ZeroIterations {
                field: "position_iterations",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub clean_interval_seconds: f32,
    pub delete_interval_seconds: f32,
    /// Upper bound on free objects destroyed per pool in one clean cycle.
    pub clean_batch_size: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            clean_interval_seconds: 10.0,
            delete_interval_seconds: 30.0,
            clean_batch_size: 16,
        }
    }
}

impl PoolSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("clean_interval_seconds", self.clean_interval_seconds),
            ("delete_interval_seconds", self.delete_interval_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidSeconds { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
    pub pools: PoolSettings,
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.loop_config.validate()?;
        self.pools.validate()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidSeconds { field: &'static str, value: f32 },
    #[error("{field} must be at least 1")]
    ZeroIterations { field: &'static str },
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
