use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

/// Rates over the most recent completed metrics window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoopMetricsSnapshot {
    /// Frames per second handed to `advance`.
    pub fps: f32,
    /// Fixed simulation steps per second.
    pub tps: f32,
    pub frame_time_ms: f32,
    pub steps_last_frame: u32,
}

#[derive(Debug, Default)]
struct Shared {
    latest: RwLock<LoopMetricsSnapshot>,
    poison_reported: AtomicBool,
}

impl Shared {
    fn report_poison(&self, access: &'static str) {
        if !self.poison_reported.swap(true, Ordering::Relaxed) {
            warn!(access, "loop_metrics_lock_poisoned");
        }
    }
}

/// Cloneable read side of the loop metrics, safe to hand to other threads.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    shared: Arc<Shared>,
}

impl MetricsHandle {
    /// Latest published window. A poisoned lock still yields the last value.
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        let guard = self.shared.latest.read().unwrap_or_else(|poisoned| {
            self.shared.report_poison("read");
            poisoned.into_inner()
        });
        *guard
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = self.shared.latest.write().unwrap_or_else(|poisoned| {
            self.shared.report_poison("write");
            PoisonError::into_inner(poisoned)
        });
        *guard = snapshot;
    }
}

/// Write side owned by a frame driver.
///
/// Frames are tallied into a window of `interval` length. When a frame lands
/// past the end of the window, its rates are published to the handle, logged
/// as `loop_metrics`, and a new window opens at that frame.
#[derive(Debug)]
pub(crate) struct LoopMetrics {
    handle: MetricsHandle,
    interval: Duration,
    window_start: Instant,
    window_frames: u32,
    window_steps: u32,
    window_frame_time: Duration,
}

impl LoopMetrics {
    pub(crate) fn new(handle: MetricsHandle, interval: Duration) -> Self {
        Self::starting_at(handle, interval, Instant::now())
    }

    fn starting_at(handle: MetricsHandle, interval: Duration, now: Instant) -> Self {
        Self {
            handle,
            interval,
            window_start: now,
            window_frames: 0,
            window_steps: 0,
            window_frame_time: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, steps: u32) {
        if let Some(snapshot) = self.record_frame_at(frame_dt, steps, Instant::now()) {
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                steps_last_frame = snapshot.steps_last_frame,
                "loop_metrics"
            );
        }
    }

    /// Tallies one frame observed at `now`; returns the published snapshot
    /// if this frame closed the window.
    fn record_frame_at(
        &mut self,
        frame_dt: Duration,
        steps: u32,
        now: Instant,
    ) -> Option<LoopMetricsSnapshot> {
        self.window_frames = self.window_frames.saturating_add(1);
        self.window_steps = self.window_steps.saturating_add(steps);
        self.window_frame_time = self.window_frame_time.saturating_add(frame_dt);

        let window = now.saturating_duration_since(self.window_start);
        if window < self.interval {
            return None;
        }

        let seconds = window.as_secs_f32().max(f32::EPSILON);
        let frames = self.window_frames as f32;
        let snapshot = LoopMetricsSnapshot {
            fps: frames / seconds,
            tps: self.window_steps as f32 / seconds,
            frame_time_ms: self.window_frame_time.as_secs_f32() * 1000.0 / frames,
            steps_last_frame: steps,
        };
        self.handle.publish(snapshot);

        self.window_start = now;
        self.window_frames = 0;
        self.window_steps = 0;
        self.window_frame_time = Duration::ZERO;
        Some(snapshot)
    }

    pub(crate) fn handle(&self) -> &MetricsHandle {
        &self.handle
    }
}
