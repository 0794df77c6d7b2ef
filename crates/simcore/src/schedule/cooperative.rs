use std::time::Duration;

use tracing::info;

use super::metrics::LoopMetrics;
use super::{FrameDriver, MetricsHandle, SchedulerError, Simulation};
use crate::config::LoopConfig;
use crate::time::FixedStepper;

/// Runs simulation steps on the calling thread; rendering follows directly in
/// the same call stack.
pub struct CooperativeDriver<S> {
    sim: S,
    stepper: FixedStepper,
    metrics: LoopMetrics,
}

impl<S: Simulation> CooperativeDriver<S> {
    pub fn new(sim: S, config: &LoopConfig, metrics: MetricsHandle) -> Self {
        let stepper = config.stepper();
        info!(
            strategy = "cooperative",
            target_tps = config.target_tps(),
            max_frame_delta_ms = stepper.max_accumulator().as_millis() as u64,
            metrics_log_interval_ms = config.metrics_log_interval().as_millis() as u64,
            "loop_config"
        );
        Self {
            sim,
            stepper,
            metrics: LoopMetrics::new(metrics, config.metrics_log_interval()),
        }
    }

    pub fn with_stepper(sim: S, stepper: FixedStepper, metrics: MetricsHandle) -> Self {
        let interval = LoopConfig::default().metrics_log_interval();
        Self {
            sim,
            stepper,
            metrics: LoopMetrics::new(metrics, interval),
        }
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn alpha(&self) -> f32 {
        self.stepper.alpha()
    }

    pub fn metrics(&self) -> &MetricsHandle {
        self.metrics.handle()
    }
}

impl<S: Simulation> FrameDriver for CooperativeDriver<S> {
    type Sim = S;

    fn advance(&mut self, delta: Duration) -> Result<u32, SchedulerError> {
        let steps = self.stepper.accumulate(delta);
        let fixed_dt = self.stepper.fixed_step_seconds();
        for _ in 0..steps {
            self.sim.step(fixed_dt);
        }
        self.metrics.record_frame(delta, steps);
        Ok(steps)
    }

    fn post_advance(&mut self) {
        self.sim.after_frame(self.stepper.alpha());
    }

    fn step_count(&self) -> u64 {
        self.stepper.step_count()
    }

    fn reset_step_count(&mut self) {
        self.stepper.reset_step_count();
    }

    fn with_sim<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        f(&mut self.sim)
    }

    fn shutdown(&mut self) {}
}
