//! Fixed-timestep frame drivers.
//!
//! Both drivers feed the same [`FixedStepper`](crate::time::FixedStepper) and
//! run the same per-step work on a [`Simulation`]; they differ only in which
//! thread executes the steps.

mod cooperative;
mod metrics;
mod worker;

pub use cooperative::CooperativeDriver;
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use worker::{ShutdownHandle, WorkerDriver, WORKER_THREAD_NAME};

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ExecutionStrategy, LoopConfig};

/// Work performed once per fixed step.
pub trait Simulation {
    fn step(&mut self, fixed_dt_seconds: f32);

    /// Called once per frame after stepping, with the leftover fraction of a
    /// step for render interpolation.
    fn after_frame(&mut self, _alpha: f32) {}
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn simulation worker thread: {0}")]
    SpawnWorker(#[source] io::Error),
    #[error("simulation worker has stopped")]
    WorkerStopped,
    #[error("simulation worker panicked during a step")]
    WorkerPanicked,
}

pub trait FrameDriver {
    type Sim: Simulation;

    /// Accumulates `delta` and runs every fixed step now due. Returns the
    /// number of steps executed for this frame.
    fn advance(&mut self, delta: Duration) -> Result<u32, SchedulerError>;

    fn post_advance(&mut self);

    /// Total fixed steps executed since creation or the last reset.
    fn step_count(&self) -> u64;

    fn reset_step_count(&mut self);

    /// Gives the caller exclusive access to the simulation between frames.
    fn with_sim<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self::Sim) -> R;

    /// Stops any worker. Idempotent.
    fn shutdown(&mut self);
}

/// Driver selected at runtime from [`ExecutionStrategy`].
pub enum AnyDriver<S: Simulation + Send + 'static> {
    Cooperative(CooperativeDriver<S>),
    Worker(WorkerDriver<S>),
}

impl<S: Simulation + Send + 'static> AnyDriver<S> {
    pub fn new(sim: S, config: &LoopConfig, metrics: MetricsHandle) -> Result<Self, SchedulerError> {
        match config.strategy {
            ExecutionStrategy::Cooperative => {
                Ok(Self::Cooperative(CooperativeDriver::new(sim, config, metrics)))
            }
            ExecutionStrategy::WorkerThread => {
                Ok(Self::Worker(WorkerDriver::spawn(sim, config, metrics)?))
            }
        }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        match self {
            Self::Cooperative(_) => ExecutionStrategy::Cooperative,
            Self::Worker(_) => ExecutionStrategy::WorkerThread,
        }
    }

    pub fn metrics(&self) -> &MetricsHandle {
        match self {
            Self::Cooperative(driver) => driver.metrics(),
            Self::Worker(driver) => driver.metrics(),
        }
    }
}

impl<S: Simulation + Send + 'static> FrameDriver for AnyDriver<S> {
    type Sim = S;

    fn advance(&mut self, delta: Duration) -> Result<u32, SchedulerError> {
        match self {
            Self::Cooperative(driver) => driver.advance(delta),
            Self::Worker(driver) => driver.advance(delta),
        }
    }

    fn post_advance(&mut self) {
        match self {
            Self::Cooperative(driver) => driver.post_advance(),
            Self::Worker(driver) => driver.post_advance(),
        }
    }

    fn step_count(&self) -> u64 {
        match self {
            Self::Cooperative(driver) => driver.step_count(),
            Self::Worker(driver) => driver.step_count(),
        }
    }

    fn reset_step_count(&mut self) {
        match self {
            Self::Cooperative(driver) => driver.reset_step_count(),
            Self::Worker(driver) => driver.reset_step_count(),
        }
    }

    fn with_sim<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        match self {
            Self::Cooperative(driver) => driver.with_sim(f),
            Self::Worker(driver) => driver.with_sim(f),
        }
    }

    fn shutdown(&mut self) {
        match self {
            Self::Cooperative(driver) => driver.shutdown(),
            Self::Worker(driver) => driver.shutdown(),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::Counter;
    use super::*;

    fn config(strategy: ExecutionStrategy) -> LoopConfig {
        LoopConfig {
            target_tps: 100,
            max_frame_delta_ms: 250,
            strategy,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn both_strategies_run_identical_step_counts() {
        let deltas = [5u64, 17, 33, 400, 1, 9, 12];
        let mut totals = Vec::new();
        for strategy in [ExecutionStrategy::Cooperative, ExecutionStrategy::WorkerThread] {
            let mut driver = AnyDriver::new(
                Counter::default(),
                &config(strategy),
                MetricsHandle::default(),
            )
            .expect("driver");
            assert_eq!(driver.strategy(), strategy);
            let mut per_frame = Vec::new();
            for delta in deltas {
                per_frame.push(driver.advance(Duration::from_millis(delta)).expect("advance"));
                driver.post_advance();
            }
            let observed = driver.with_sim(|sim| sim.steps.load(Ordering::SeqCst));
            assert_eq!(observed, driver.step_count());
            driver.shutdown();
            totals.push((per_frame, observed));
        }
        assert_eq!(totals[0], totals[1]);
        // 5+17+33+250+1+9+12 = 327ms at 10ms per step.
        assert_eq!(totals[0].1, 32);
    }
}
