use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::metrics::LoopMetrics;
use super::{FrameDriver, MetricsHandle, SchedulerError, Simulation};
use crate::config::LoopConfig;
use crate::time::FixedStepper;

pub const WORKER_THREAD_NAME: &str = "simcore-worker";

static WORKER_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, lock: &'static str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        if WORKER_LOCK_POISON_WARNED
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            warn!(lock, "worker lock poisoned; recovered inner value");
        }
        poisoned.into_inner()
    })
}

#[derive(Debug)]
struct Control {
    running: bool,
    /// Frame delta waiting for the worker. At most one at a time.
    pending: Option<Duration>,
    /// A request was submitted and its caller has not been released yet.
    in_flight: bool,
    /// The worker is executing a drain right now.
    busy: bool,
    completed: u64,
    last_steps: u32,
    panicked: bool,
}

/// Handshake between the owning thread and the worker.
///
/// Every wait re-checks its predicate after waking, so spurious wakeups and
/// notifications sent before the wait began are both harmless.
#[derive(Debug)]
struct Gate {
    control: Mutex<Control>,
    work_ready: Condvar,
    work_done: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            control: Mutex::new(Control {
                running: true,
                pending: None,
                in_flight: false,
                busy: false,
                completed: 0,
                last_steps: 0,
                panicked: false,
            }),
            work_ready: Condvar::new(),
            work_done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        lock_or_recover(&self.control, "control")
    }

    fn wait_done<'a>(&self, guard: MutexGuard<'a, Control>) -> MutexGuard<'a, Control> {
        self.work_done
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Submits one drain request and blocks until the worker finished it or
    /// the request was abandoned by shutdown.
    fn submit(&self, delta: Duration) -> Result<u32, SchedulerError> {
        let mut control = self.lock();
        while control.in_flight && (control.running || control.busy) {
            control = self.wait_done(control);
        }
        if control.panicked {
            return Err(SchedulerError::WorkerPanicked);
        }
        if !control.running {
            return Err(SchedulerError::WorkerStopped);
        }

        let ticket = control.completed;
        control.pending = Some(delta);
        control.in_flight = true;
        self.work_ready.notify_one();
        while control.in_flight {
            control = self.wait_done(control);
        }

        if control.panicked {
            Err(SchedulerError::WorkerPanicked)
        } else if control.completed == ticket {
            Err(SchedulerError::WorkerStopped)
        } else {
            Ok(control.last_steps)
        }
    }

    /// Blocks the worker until a request arrives. `None` means stop.
    fn next_job(&self) -> Option<Duration> {
        let mut control = self.lock();
        loop {
            if !control.running {
                return None;
            }
            if let Some(delta) = control.pending.take() {
                control.busy = true;
                return Some(delta);
            }
            control = self
                .work_ready
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Publishes the outcome of a drain and releases the waiting caller.
    /// Returns whether the worker should keep going.
    fn finish_job(&self, outcome: Option<u32>) -> bool {
        let mut control = self.lock();
        control.busy = false;
        control.in_flight = false;
        control.completed = control.completed.wrapping_add(1);
        match outcome {
            Some(steps) => control.last_steps = steps,
            None => {
                control.panicked = true;
                control.running = false;
            }
        }
        let keep_running = control.running;
        drop(control);
        self.work_done.notify_all();
        keep_running
    }

    /// Clears the running flag and force-releases anything that would
    /// otherwise wait on a job that will never run.
    fn request_stop(&self) -> bool {
        let mut control = self.lock();
        let was_running = control.running;
        control.running = false;
        if !control.busy {
            control.pending = None;
            control.in_flight = false;
        }
        drop(control);
        self.work_ready.notify_all();
        self.work_done.notify_all();
        was_running
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }
}

struct Stage<S> {
    sim: S,
    stepper: FixedStepper,
}

/// Cloneable stop signal for a [`WorkerDriver`], usable from any thread.
///
/// It only stops the worker; joining stays with the driver's owner.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    gate: Arc<Gate>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.gate.request_stop() {
            info!("worker_stop_requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_running()
    }
}

/// Runs simulation steps on a dedicated thread.
///
/// `advance` hands the frame delta to the worker and blocks until the whole
/// accumulator drain is done, so the owner never observes a half-stepped
/// simulation and two frames never overlap.
pub struct WorkerDriver<S> {
    gate: Arc<Gate>,
    stage: Arc<Mutex<Stage<S>>>,
    thread: Option<JoinHandle<()>>,
    metrics: LoopMetrics,
}

impl<S: Simulation + Send + 'static> WorkerDriver<S> {
    pub fn spawn(sim: S, config: &LoopConfig, metrics: MetricsHandle) -> Result<Self, SchedulerError> {
        let stepper = config.stepper();
        info!(
            strategy = "worker_thread",
            target_tps = config.target_tps(),
            max_frame_delta_ms = stepper.max_accumulator().as_millis() as u64,
            metrics_log_interval_ms = config.metrics_log_interval().as_millis() as u64,
            "loop_config"
        );
        Self::spawn_with_stepper(sim, stepper, metrics, config.metrics_log_interval())
    }

    pub fn spawn_with_stepper(
        sim: S,
        stepper: FixedStepper,
        metrics: MetricsHandle,
        metrics_log_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let gate = Arc::new(Gate::new());
        let stage = Arc::new(Mutex::new(Stage { sim, stepper }));
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn({
                let gate = Arc::clone(&gate);
                let stage = Arc::clone(&stage);
                move || worker_loop(&gate, &stage)
            })
            .map_err(SchedulerError::SpawnWorker)?;
        Ok(Self {
            gate,
            stage,
            thread: Some(thread),
            metrics: LoopMetrics::new(metrics, metrics_log_interval),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            gate: Arc::clone(&self.gate),
        }
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_running()
    }

    pub fn metrics(&self) -> &MetricsHandle {
        self.metrics.handle()
    }

    fn stage(&self) -> MutexGuard<'_, Stage<S>> {
        lock_or_recover(&self.stage, "stage")
    }
}

impl<S: Simulation + Send + 'static> FrameDriver for WorkerDriver<S> {
    type Sim = S;

    fn advance(&mut self, delta: Duration) -> Result<u32, SchedulerError> {
        let steps = self.gate.submit(delta)?;
        self.metrics.record_frame(delta, steps);
        Ok(steps)
    }

    fn post_advance(&mut self) {
        let mut stage = self.stage();
        let alpha = stage.stepper.alpha();
        stage.sim.after_frame(alpha);
    }

    fn step_count(&self) -> u64 {
        self.stage().stepper.step_count()
    }

    fn reset_step_count(&mut self) {
        self.stage().stepper.reset_step_count();
    }

    fn with_sim<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        f(&mut self.stage().sim)
    }

    /// Stops the worker and joins it. Safe to call repeatedly.
    fn shutdown(&mut self) {
        self.gate.request_stop();
        let Some(thread) = self.thread.take() else {
            return;
        };
        match thread.join() {
            Ok(()) => info!("worker_joined"),
            Err(_) => error!("worker_join_failed"),
        }
    }
}

impl<S> Drop for WorkerDriver<S> {
    fn drop(&mut self) {
        self.gate.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("worker_join_failed");
            }
        }
    }
}

fn worker_loop<S: Simulation>(gate: &Gate, stage: &Mutex<Stage<S>>) {
    info!("worker_started");
    while let Some(delta) = gate.next_job() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut stage = lock_or_recover(stage, "stage");
            let Stage { sim, stepper } = &mut *stage;
            let steps = stepper.accumulate(delta);
            let fixed_dt = stepper.fixed_step_seconds();
            for _ in 0..steps {
                sim.step(fixed_dt);
            }
            steps
        }));
        if outcome.is_err() {
            error!("worker_panicked");
        } else {
            debug!(delta_ms = delta.as_millis() as u64, "worker_drain_done");
        }
        if !gate.finish_job(outcome.ok()) {
            break;
        }
    }
    info!("worker_stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;
    use crate::schedule::testing::Counter;

    fn spawn<S: Simulation + Send + 'static>(sim: S, step_ms: u64) -> WorkerDriver<S> {
        WorkerDriver::spawn_with_stepper(
            sim,
            FixedStepper::new(Duration::from_millis(step_ms), Duration::from_millis(250)),
            MetricsHandle::default(),
            Duration::from_secs(1),
        )
        .expect("spawn worker")
    }

    /// Sleeps inside every step so a drain takes a noticeable amount of time.
    struct Slow {
        started: Option<mpsc::Sender<()>>,
        steps: Arc<AtomicU64>,
    }

    impl Simulation for Slow {
        fn step(&mut self, _fixed_dt_seconds: f32) {
            if let Some(started) = self.started.take() {
                let _ = started.send(());
            }
            thread::sleep(Duration::from_millis(5));
            self.steps.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Exploding;

    impl Simulation for Exploding {
        fn step(&mut self, _fixed_dt_seconds: f32) {
            panic!("step failed");
        }
    }

    #[test]
    fn advance_blocks_until_drain_completes() {
        let steps = Arc::new(AtomicU64::new(0));
        let sim = Counter {
            steps: steps.clone(),
            ..Counter::default()
        };
        let mut driver = spawn(sim, 10);

        assert_eq!(driver.advance(Duration::from_millis(45)).expect("advance"), 4);
        assert_eq!(steps.load(Ordering::SeqCst), 4);
        assert_eq!(driver.step_count(), 4);
        driver.post_advance();
        let alpha = driver.with_sim(|sim| sim.last_alpha).expect("alpha");
        assert!((alpha - 0.5).abs() < 1e-4);
        driver.shutdown();
        driver.shutdown();
        assert!(!driver.is_running());
    }

    #[test]
    fn advance_after_shutdown_reports_stopped() {
        let mut driver = spawn(Counter::default(), 10);
        driver.shutdown_handle().shutdown();
        assert!(matches!(
            driver.advance(Duration::from_millis(20)),
            Err(SchedulerError::WorkerStopped)
        ));
        driver.shutdown();
    }

    #[test]
    fn shutdown_during_pending_request_releases_caller() {
        let steps = Arc::new(AtomicU64::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let sim = Slow {
            started: Some(started_tx),
            steps: steps.clone(),
        };
        let mut driver = spawn(sim, 10);
        let handle = driver.shutdown_handle();

        let stopper = thread::spawn(move || {
            let _ = started_rx.recv_timeout(Duration::from_secs(5));
            handle.shutdown();
        });

        let begun = Instant::now();
        let result = driver.advance(Duration::from_millis(200));
        assert!(begun.elapsed() < Duration::from_secs(5));
        // The drain in progress is allowed to finish; nothing runs after it.
        assert_eq!(result.expect("in-progress drain completes"), 20);
        stopper.join().expect("stopper thread");

        assert!(matches!(
            driver.advance(Duration::from_millis(20)),
            Err(SchedulerError::WorkerStopped)
        ));
        driver.shutdown();
        assert_eq!(steps.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn panicking_step_surfaces_error_and_stops_worker() {
        let mut driver = spawn(Exploding, 10);
        assert!(matches!(
            driver.advance(Duration::from_millis(20)),
            Err(SchedulerError::WorkerPanicked)
        ));
        assert!(matches!(
            driver.advance(Duration::from_millis(20)),
            Err(SchedulerError::WorkerPanicked)
        ));
        assert!(!driver.is_running());
        driver.shutdown();
    }

    #[test]
    fn drop_joins_worker() {
        let driver = spawn(Counter::default(), 10);
        let handle = driver.shutdown_handle();
        drop(driver);
        assert!(!handle.is_running());
    }
}
