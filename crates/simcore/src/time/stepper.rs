use std::time::Duration;

/// Default clamp on a single frame's contribution to the accumulator.
pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Fixed-timestep accumulator.
///
/// Each frame adds `min(delta, max_accumulator)` and then drains whole
/// `fixed_step`s. Working in `Duration` keeps accumulation exact, so the total
/// step count does not depend on how frame deltas were chunked.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    fixed_step: Duration,
    max_accumulator: Duration,
    accumulator: Duration,
    step_count: u64,
}

impl FixedStepper {
    pub fn new(fixed_step: Duration, max_accumulator: Duration) -> Self {
        Self {
            fixed_step,
            max_accumulator,
            accumulator: Duration::ZERO,
            step_count: 0,
        }
    }

    /// Adds a frame delta and returns how many fixed steps are now due.
    ///
    /// The due steps are already subtracted from the accumulator and counted;
    /// the caller is expected to run exactly that many steps. A zero step or a
    /// zero clamp yields zero steps.
    pub fn accumulate(&mut self, delta: Duration) -> u32 {
        let clamped = delta.min(self.max_accumulator);
        self.accumulator = self.accumulator.saturating_add(clamped);
        if self.fixed_step.is_zero() {
            return 0;
        }

        let due = self.accumulator.as_nanos() / self.fixed_step.as_nanos();
        let steps = u32::try_from(due).unwrap_or(u32::MAX);
        let drained = self
            .fixed_step
            .checked_mul(steps)
            .unwrap_or(self.accumulator);
        self.accumulator = self.accumulator.saturating_sub(drained);
        self.step_count = self.step_count.saturating_add(u64::from(steps));
        steps
    }

    /// Float-seconds entry point; negative or non-finite deltas count as zero.
    pub fn accumulate_seconds(&mut self, delta_seconds: f32) -> u32 {
        let delta = Duration::try_from_secs_f32(delta_seconds).unwrap_or(Duration::ZERO);
        self.accumulate(delta)
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    pub fn alpha(&self) -> f32 {
        if self.fixed_step.is_zero() {
            return 0.0;
        }
        (self.accumulator.as_secs_f64() / self.fixed_step.as_secs_f64()) as f32
    }

    pub fn fixed_step(&self) -> Duration {
        self.fixed_step
    }

    pub fn fixed_step_seconds(&self) -> f32 {
        self.fixed_step.as_secs_f32()
    }

    pub fn max_accumulator(&self) -> Duration {
        self.max_accumulator
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn reset_step_count(&mut self) {
        self.step_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stepper() -> FixedStepper {
        FixedStepper::new(Duration::from_millis(16), Duration::from_millis(250))
    }

    #[test]
    fn drains_whole_steps_and_keeps_remainder() {
        let mut stepper = stepper();
        assert_eq!(stepper.accumulate(Duration::from_millis(50)), 3);
        assert_eq!(stepper.accumulator(), Duration::from_millis(2));
        assert_eq!(stepper.step_count(), 3);
    }

    #[test]
    fn step_total_is_independent_of_chunking() {
        let deltas_ms = [3u64, 17, 40, 9, 300, 1, 16, 16, 5, 120];
        let mut whole = stepper();
        let mut whole_steps = 0u64;
        for ms in deltas_ms {
            whole_steps += u64::from(whole.accumulate(Duration::from_millis(ms)));
        }

        let clamped_total: u64 = deltas_ms.iter().map(|ms| (*ms).min(250)).sum();
        assert_eq!(whole_steps, clamped_total / 16);

        // Same clamped time delivered in 1ms slices.
        let mut sliced = stepper();
        let mut sliced_steps = 0u64;
        for _ in 0..clamped_total {
            sliced_steps += u64::from(sliced.accumulate(Duration::from_millis(1)));
        }
        assert_eq!(sliced_steps, whole_steps);
        assert_eq!(sliced.accumulator(), whole.accumulator());
        assert_eq!(whole.step_count(), whole_steps);
    }

    #[test]
    fn stall_is_clamped_to_max_accumulator() {
        let mut stepper = stepper();
        let steps = stepper.accumulate(Duration::from_secs(10));
        assert_eq!(steps, 250 / 16);
    }

    #[test]
    fn zero_fixed_step_never_steps() {
        let mut stepper = FixedStepper::new(Duration::ZERO, Duration::from_millis(250));
        assert_eq!(stepper.accumulate(Duration::from_millis(100)), 0);
        assert_eq!(stepper.alpha(), 0.0);
    }

    #[test]
    fn zero_clamp_never_steps() {
        let mut stepper = FixedStepper::new(Duration::from_millis(16), Duration::ZERO);
        assert_eq!(stepper.accumulate(Duration::from_secs(1)), 0);
        assert_eq!(stepper.accumulator(), Duration::ZERO);
    }

    #[test]
    fn negative_float_delta_counts_as_zero() {
        let mut stepper = stepper();
        assert_eq!(stepper.accumulate_seconds(-1.0), 0);
        assert_eq!(stepper.accumulate_seconds(f32::NAN), 0);
        assert_eq!(stepper.accumulator(), Duration::ZERO);
    }

    #[test]
    fn alpha_reports_leftover_fraction() {
        let mut stepper = stepper();
        stepper.accumulate(Duration::from_millis(24));
        assert!((stepper.alpha() - 0.5).abs() < 0.0001);
    }

    #[test]
    fn reset_step_count_keeps_accumulator() {
        let mut stepper = stepper();
        stepper.accumulate(Duration::from_millis(20));
        stepper.reset_step_count();
        assert_eq!(stepper.step_count(), 0);
        assert_eq!(stepper.accumulator(), Duration::from_millis(4));
    }
}
