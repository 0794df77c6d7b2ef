//! Timekeeping primitives: owner-driven countdown timers and the fixed-step accumulator.

mod stepper;
mod timer;

pub use stepper::{FixedStepper, DEFAULT_MAX_FRAME_DELTA};
pub use timer::Timer;
