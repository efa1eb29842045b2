//! Fixed-rate task scheduler.
//!
//! Each registered [`PeriodicTask`] gets a dedicated OS thread. A context
//! keeps an absolute deadline and advances it by one period per run, then
//! sleeps on the shared [`StopSignal`] until that deadline. Sleeping on the
//! signal rather than the clock is what lets [`Scheduler::stop`] return
//! within one wake-up instead of one period.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;
use crate::priority::elevate_current_thread;
use crate::stats::{TaskCounters, TaskState, TaskStats};
use crate::stop::StopSignal;
use crate::task::{PeriodicTask, TaskPriority};

/// What a context does when a run finishes past its next deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverrunPolicy {
    /// Run again immediately for every missed period until caught up.
    FreeRun,
    /// Drop the missed periods and realign to the next future deadline.
    #[default]
    SkipMissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

struct Registered {
    name: String,
    rate_hz: f64,
    period: Duration,
    priority: TaskPriority,
    counters: Arc<TaskCounters>,
    /// Moved into the context thread on start.
    task: Option<PeriodicTask>,
}

/// Runs periodic tasks on dedicated threads until stopped.
///
/// Tasks are registered while idle, all started together, and all stopped
/// together. A scheduler runs once; after [`stop`](Self::stop) it cannot be
/// restarted. Dropping a running scheduler stops it.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use sensorhub_rt::{PeriodicTask, Scheduler};
///
/// let runs = Arc::new(AtomicU32::new(0));
/// let counter = runs.clone();
///
/// let mut scheduler = Scheduler::new();
/// scheduler
///     .add(PeriodicTask::new("tick", 100.0, move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }))
///     .unwrap();
///
/// scheduler.start().unwrap();
/// std::thread::sleep(Duration::from_millis(50));
/// scheduler.stop();
///
/// let after_stop = runs.load(Ordering::Relaxed);
/// assert!(after_stop >= 1);
/// std::thread::sleep(Duration::from_millis(30));
/// assert_eq!(runs.load(Ordering::Relaxed), after_stop);
/// ```
pub struct Scheduler {
    tasks: Vec<Registered>,
    handles: Vec<(String, JoinHandle<()>)>,
    stop: StopSignal,
    overrun_policy: OverrunPolicy,
    phase: Phase,
}

impl Scheduler {
    /// Create a scheduler with its own stop signal.
    pub fn new() -> Self {
        Self::with_stop_signal(StopSignal::new())
    }

    /// Create a scheduler that stops when `stop` is triggered from anywhere.
    pub fn with_stop_signal(stop: StopSignal) -> Self {
        Self {
            tasks: Vec::new(),
            handles: Vec::new(),
            stop,
            overrun_policy: OverrunPolicy::default(),
            phase: Phase::Idle,
        }
    }

    /// Set how contexts recover from overruns.
    pub fn overrun_policy(mut self, policy: OverrunPolicy) -> Self {
        self.overrun_policy = policy;
        self
    }

    /// The signal that stops this scheduler.
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Register a task. Only allowed before [`start`](Self::start).
    pub fn add(&mut self, task: PeriodicTask) -> Result<(), SchedulerError> {
        match self.phase {
            Phase::Idle => {}
            Phase::Running => return Err(SchedulerError::AlreadyStarted),
            Phase::Stopped => return Err(SchedulerError::Stopped),
        }

        let period = task.period().ok_or_else(|| SchedulerError::InvalidRate {
            name: task.name.clone(),
            rate_hz: task.rate_hz,
        })?;
        if task.name.contains('\0') {
            return Err(SchedulerError::InvalidName(task.name.clone()));
        }

        debug!(
            "Registered task '{}' at {} Hz (period {:?}, priority {})",
            task.name, task.rate_hz, period, task.priority
        );
        self.tasks.push(Registered {
            name: task.name.clone(),
            rate_hz: task.rate_hz,
            period,
            priority: task.priority,
            counters: Arc::new(TaskCounters::new()),
            task: Some(task),
        });
        Ok(())
    }

    /// Spawn one context per registered task.
    ///
    /// If any spawn fails, contexts already started are stopped and joined
    /// before the error is returned.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.phase {
            Phase::Idle => {}
            Phase::Running => return Err(SchedulerError::AlreadyStarted),
            Phase::Stopped => return Err(SchedulerError::Stopped),
        }
        if self.tasks.is_empty() {
            return Err(SchedulerError::NoTasks);
        }
        if self.stop.is_triggered() {
            self.phase = Phase::Stopped;
            return Err(SchedulerError::Stopped);
        }

        self.phase = Phase::Running;
        let mut failure = None;
        for registered in &mut self.tasks {
            let Some(task) = registered.task.take() else {
                continue;
            };
            let context = Context {
                period: registered.period,
                policy: self.overrun_policy,
                stop: self.stop.clone(),
                counters: registered.counters.clone(),
                task,
            };
            registered.counters.set_state(TaskState::Running);

            let spawned = thread::Builder::new()
                .name(registered.name.clone())
                .spawn(move || context.run());
            match spawned {
                Ok(handle) => self.handles.push((registered.name.clone(), handle)),
                Err(source) => {
                    registered.counters.set_state(TaskState::Faulted);
                    failure = Some((registered.name.clone(), source));
                    break;
                }
            }
        }

        if let Some((name, source)) = failure {
            error!("Failed to spawn context for task '{}': {}", name, source);
            self.stop();
            return Err(SchedulerError::Spawn { name, source });
        }

        info!("Scheduler started {} task(s)", self.handles.len());
        Ok(())
    }

    /// Stop every context and wait for all of them to exit.
    ///
    /// Idempotent. On a scheduler that was never started this does nothing:
    /// the stop signal is left alone and [`start`](Self::start) still works.
    pub fn stop(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        self.phase = Phase::Stopped;

        for registered in &self.tasks {
            registered
                .counters
                .transition(TaskState::Running, TaskState::StopRequested);
        }
        self.stop.trigger();

        for (name, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                // Bodies run under catch_unwind, so this is the loop itself
                error!("Context for task '{}' panicked outside its body", name);
            }
        }

        for registered in &self.tasks {
            if registered.counters.state() != TaskState::Faulted {
                registered.counters.set_state(TaskState::Joined);
            }
        }

        info!("Scheduler stopped");
    }

    /// Whether contexts are currently running.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Counters for every registered task, in registration order.
    pub fn stats(&self) -> Vec<TaskStats> {
        self.tasks
            .iter()
            .map(|r| r.counters.snapshot(&r.name, r.rate_hz, r.priority))
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.tasks.len())
            .field("phase", &self.phase)
            .field("overrun_policy", &self.overrun_policy)
            .finish()
    }
}

/// Number of whole periods `next` has fallen behind `now`, counting the
/// current one.
fn periods_behind(now: Instant, next: Instant, period: Duration) -> u32 {
    let behind = now.saturating_duration_since(next);
    let missed = behind.as_nanos() / period.as_nanos().max(1) + 1;
    u32::try_from(missed).unwrap_or(u32::MAX)
}

/// State owned by one task's thread.
struct Context {
    period: Duration,
    policy: OverrunPolicy,
    stop: StopSignal,
    counters: Arc<TaskCounters>,
    task: PeriodicTask,
}

impl Context {
    fn run(mut self) {
        let name = self.task.name.clone();
        match elevate_current_thread(self.task.priority) {
            Ok(true) => {
                self.counters.set_elevated(true);
                debug!("Task '{}' running with priority {}", name, self.task.priority);
            }
            Ok(false) => {}
            Err(e) => warn!(
                "Task '{}' could not get priority {}, running at default: {}",
                name, self.task.priority, e
            ),
        }

        let mut next = Instant::now();
        loop {
            if self.stop.is_triggered() {
                break;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| self.task.run_once())) {
                Ok(Ok(())) => self.counters.record_run(),
                Ok(Err(e)) => {
                    error!("Task '{}' failed: {}", name, e);
                    self.counters.set_state(TaskState::Faulted);
                    return;
                }
                Err(_) => {
                    error!("Task '{}' panicked", name);
                    self.counters.set_state(TaskState::Faulted);
                    return;
                }
            }

            next += self.period;
            let now = Instant::now();
            if now >= next {
                let overruns = self.counters.record_overrun();
                if overruns == 1 {
                    warn!(
                        "Task '{}' overran its {:?} period (further overruns logged at debug)",
                        name, self.period
                    );
                } else {
                    debug!("Task '{}' overran ({} total)", name, overruns);
                }
                if self.policy == OverrunPolicy::SkipMissed {
                    let missed = periods_behind(now, next, self.period);
                    next += self.period * missed;
                    self.counters.record_skipped(u64::from(missed));
                }
            }

            if self.stop.wait_until(next) {
                break;
            }
        }
        debug!("Task '{}' context exiting", name);
    }
}
