//! Periodic task scheduler and supervisor.
//!
//! One OS thread per task. Each thread waits on a [`WakeSignal`] posted
//! by a dedicated per-task timer thread, executes its tick body, and
//! checks the elapsed time against `period * OVERRUN_BUDGET_FACTOR`.
//! RT scheduling (`SCHED_FIFO`, `mlockall`) is applied when the `rt`
//! feature is enabled, mirroring the teacher's `rt_setup` sequence;
//! without it, timing falls back to `std::thread::sleep` pacing.

use asi_common::consts::{CANCELLATION_POLL_MS, OVERRUN_BUDGET_FACTOR};
use asi_common::events::EventId;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::shared::Shared;

/// Counting-but-coalescing wake primitive.
///
/// `post` never accumulates past one pending wake; a task that hasn't
/// yet consumed the previous post simply sees the same single pending
/// flag. This implements "the body drains the semaphore to one before
/// executing" without an actual OS semaphore.
pub struct WakeSignal {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Called by the timer thread. Always posts, coalescing freely.
    pub fn post(&self) {
        let mut pending = self.pending.lock().unwrap();
        *pending = true;
        self.condvar.notify_one();
    }

    /// Waits up to `timeout` for a pending wake, draining it to
    /// consumed on return. Returns `true` if woken, `false` on timeout
    /// (used to re-check the cancellation flag per spec §5).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let pending = self.pending.lock().unwrap();
        let (mut pending, result) = self
            .condvar
            .wait_timeout_while(pending, timeout, |p| !*p)
            .unwrap();
        if *pending {
            *pending = false;
            true
        } else {
            debug_assert!(result.timed_out());
            false
        }
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-task bookkeeping visible to the supervisor's `monitor` pass.
pub struct TaskHandle {
    pub name: &'static str,
    pub wake: Arc<WakeSignal>,
    pub overrun_count: AtomicU32,
    pub restart_count: AtomicU32,
    pub crashed: AtomicBool,
    join: Mutex<Option<std::thread::JoinHandle<()>>>,
    timer_join: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl TaskHandle {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            wake: Arc::new(WakeSignal::new()),
            overrun_count: AtomicU32::new(0),
            restart_count: AtomicU32::new(0),
            crashed: AtomicBool::new(false),
            join: Mutex::new(None),
            timer_join: Mutex::new(None),
        })
    }
}

/// One row of the scheduler's task table.
pub struct TaskSpec {
    pub name: &'static str,
    pub period: Duration,
    pub priority: i32,
    pub body: Box<dyn Fn(&Shared) + Send + Sync>,
}

/// Owns every spawned task thread and its timer thread.
pub struct Scheduler {
    handles: Vec<Arc<TaskHandle>>,
}

/// Status returned by [`Scheduler::start`], distinguishing the broad
/// failure classes a caller needs to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    ResourceError,
    PermissionError,
    InvalidArgument,
}

impl Scheduler {
    /// Spawn every task in `specs`, each with its own timer thread.
    pub fn start(specs: Vec<TaskSpec>, shared: Arc<Shared>) -> (Self, StartStatus) {
        if specs.is_empty() {
            return (Self { handles: Vec::new() }, StartStatus::InvalidArgument);
        }

        let mut handles = Vec::with_capacity(specs.len());
        for spec in specs {
            let handle = TaskHandle::new(spec.name);
            let period = spec.period;

            let timer_wake = handle.wake.clone();
            let timer_shared = shared.clone();
            let timer_name = spec.name;
            let timer_join = match std::thread::Builder::new()
                .name(format!("{timer_name}-timer"))
                .spawn(move || timer_loop(timer_wake, period, timer_shared))
            {
                Ok(j) => j,
                Err(_) => return (Self { handles: Vec::new() }, StartStatus::ResourceError),
            };

            let task_handle = handle.clone();
            let task_shared = shared.clone();
            let body = spec.body;
            let priority = spec.priority;
            let task_name = spec.name;
            let join = match std::thread::Builder::new()
                .name(task_name.to_string())
                .spawn(move || {
                    apply_rt_scheduling(priority);
                    task_loop(task_handle, task_shared, period, body)
                }) {
                Ok(j) => j,
                Err(e) => {
                    warn!(task = task_name, error = %e, "failed to spawn task thread");
                    return (Self { handles: Vec::new() }, StartStatus::ResourceError);
                }
            };

            *handle.join.lock().unwrap() = Some(join);
            *handle.timer_join.lock().unwrap() = Some(timer_join);
            handles.push(handle);
        }

        (Self { handles }, StartStatus::Started)
    }

    /// One supervisor tick: check crash
    /// flags and restart counters. Returns `true` if any task has
    /// exhausted `MAX_RESTARTS` and the worker must shut itself down.
    pub fn monitor(&self, shared: &Shared) -> bool {
        let max_restarts = shared.max_restarts;
        for h in &self.handles {
            if h.crashed.load(Ordering::SeqCst) {
                let n = h.restart_count.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(task = h.name, restarts = n, "task crashed");
                if n >= max_restarts {
                    warn!(task = h.name, "task exceeded MAX_RESTARTS, initiating shutdown");
                    return true;
                }
            }
        }
        false
    }

    /// Signal cancellation to every task and wait for them to quiesce.
    pub fn shutdown(&mut self, shared: &Shared) {
        shared.shutdown.store(true, Ordering::SeqCst);
        for h in &self.handles {
            h.wake.post();
        }
        for h in &self.handles {
            if let Some(join) = h.join.lock().unwrap().take() {
                let _ = join.join();
            }
            if let Some(join) = h.timer_join.lock().unwrap().take() {
                let _ = join.join();
            }
        }
    }

    pub fn task_overruns(&self, name: &str) -> u32 {
        self.handles
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.overrun_count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

/// Timer thread body: posts the wake signal every `period` until
/// shutdown is observed.
fn timer_loop(wake: Arc<WakeSignal>, period: Duration, shared: Arc<Shared>) {
    let mut next = Instant::now() + period;
    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        }
        wake.post();
        next += period;
    }
}

/// Task thread body: wait for a wake, run one tick,
/// measure against the overrun budget, repeat until shutdown.
fn task_loop(handle: Arc<TaskHandle>, shared: Arc<Shared>, period: Duration, body: Box<dyn Fn(&Shared) + Send + Sync>) {
    let budget = period.mul_f64(OVERRUN_BUDGET_FACTOR);
    let poll = Duration::from_millis(CANCELLATION_POLL_MS);

    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        // Honor a short timed-wait so cancellation is observed even
        // with no further timer posts.
        if !handle.wake.wait_timeout(poll) {
            continue;
        }
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let start = Instant::now();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| body(&shared)));
        let elapsed = start.elapsed();

        if result.is_err() {
            handle.crashed.store(true, Ordering::SeqCst);
            warn!(task = handle.name, "task body panicked");
            continue;
        }

        if elapsed > budget {
            handle.overrun_count.fetch_add(1, Ordering::SeqCst);
            debug!(task = handle.name, elapsed_us = elapsed.as_micros(), budget_us = budget.as_micros(), "tick overrun");
            shared.raise(EventId::Overrun);
        }
    }
}

/// Apply `SCHED_FIFO` scheduling at the given RT priority. No-op
/// without the `rt` feature (simulation / development mode).
#[cfg(feature = "rt")]
fn apply_rt_scheduling(priority: i32) {
    let param = libc::sched_param { sched_priority: priority };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        warn!(priority, error = %err, "sched_setscheduler(SCHED_FIFO) failed, continuing at default priority");
    }
}

#[cfg(not(feature = "rt"))]
fn apply_rt_scheduling(_priority: i32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_signal_coalesces_repeated_posts() {
        let signal = WakeSignal::new();
        signal.post();
        signal.post();
        signal.post();
        assert!(signal.wait_timeout(Duration::from_millis(50)));
        // A second wait with no intervening post times out.
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn wake_signal_wakes_on_post_from_another_thread() {
        let signal = Arc::new(WakeSignal::new());
        let other = signal.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            other.post();
        });
        assert!(signal.wait_timeout(Duration::from_millis(500)));
    }

    #[test]
    fn start_with_no_tasks_is_invalid_argument() {
        let shared = Arc::new(Shared::new(asi_common::config::AsiConfig::default()));
        let (_sched, status) = Scheduler::start(Vec::new(), shared);
        assert_eq!(status, StartStatus::InvalidArgument);
    }
}
