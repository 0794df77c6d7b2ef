/// Countdown timer advanced explicitly by its owner, used for cooldowns,
/// grace windows and periodic maintenance.
///
/// `elapsed` only moves while the timer is running. A timer with a zero
/// duration never reports finished.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timer {
    duration: f32,
    elapsed: f32,
    running: bool,
}

impl Timer {
    /// Creates a stopped timer.
    pub fn new(duration_seconds: f32) -> Self {
        Self {
            duration: sanitize_seconds(duration_seconds),
            elapsed: 0.0,
            running: false,
        }
    }

    pub fn started(duration_seconds: f32) -> Self {
        let mut timer = Self::new(duration_seconds);
        timer.start();
        timer
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Zeroes elapsed time without touching the running flag.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn restart(&mut self) {
        self.reset();
        self.start();
    }

    pub fn advance(&mut self, dt_seconds: f32) {
        if self.running {
            self.elapsed += sanitize_seconds(dt_seconds);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.duration > 0.0 && self.elapsed >= self.duration
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn remaining(&self) -> f32 {
        (self.duration - self.elapsed).max(0.0)
    }
}

fn sanitize_seconds(seconds: f32) -> f32 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
