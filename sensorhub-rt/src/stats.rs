//! Per-task runtime counters.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::task::TaskPriority;

/// Lifecycle of a task's execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, not yet started.
    Idle,
    /// The context thread is looping.
    Running,
    /// Stop was requested; the context has not been joined yet.
    StopRequested,
    /// The context thread exited and was joined.
    Joined,
    /// The body returned an error or panicked; the context exited early.
    Faulted,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Idle,
            1 => TaskState::Running,
            2 => TaskState::StopRequested,
            3 => TaskState::Joined,
            _ => TaskState::Faulted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskState::Idle => 0,
            TaskState::Running => 1,
            TaskState::StopRequested => 2,
            TaskState::Joined => 3,
            TaskState::Faulted => 4,
        }
    }
}

/// Counters shared between a task's context thread and the scheduler.
///
/// Written with relaxed atomics from the context; read for reporting only.
#[derive(Debug)]
pub(crate) struct TaskCounters {
    state: AtomicU8,
    runs: AtomicU64,
    overruns: AtomicU64,
    skipped: AtomicU64,
    elevated: AtomicBool,
}

impl TaskCounters {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Idle.as_u8()),
            runs: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            elevated: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Move to `to` only if currently in `from`.
    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the overrun count including this one.
    pub(crate) fn record_overrun(&self) -> u64 {
        self.overruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_skipped(&self, periods: u64) {
        self.skipped.fetch_add(periods, Ordering::Relaxed);
    }

    pub(crate) fn set_elevated(&self, elevated: bool) {
        self.elevated.store(elevated, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, name: &str, rate_hz: f64, priority: TaskPriority) -> TaskStats {
        TaskStats {
            name: name.to_string(),
            rate_hz,
            priority,
            state: self.state(),
            runs: self.runs.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            skipped_periods: self.skipped.load(Ordering::Relaxed),
            elevated: self.elevated.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStats {
    pub name: String,
    pub rate_hz: f64,
    pub priority: TaskPriority,
    pub state: TaskState,
    /// Completed executions of the body.
    pub runs: u64,
    /// Executions that finished after the next deadline had passed.
    pub overruns: u64,
    /// Periods dropped to catch up after overruns.
    pub skipped_periods: u64,
    /// Whether the OS granted the requested real-time priority.
    pub elevated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        for state in [
            TaskState::Idle,
            TaskState::Running,
            TaskState::StopRequested,
            TaskState::Joined,
            TaskState::Faulted,
        ] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let counters = TaskCounters::new();
        assert!(!counters.transition(TaskState::Running, TaskState::StopRequested));
        assert!(counters.transition(TaskState::Idle, TaskState::Running));
        assert_eq!(counters.state(), TaskState::Running);
    }

    #[test]
    fn test_snapshot_reports_counters() {
        let counters = TaskCounters::new();
        counters.record_run();
        counters.record_run();
        assert_eq!(counters.record_overrun(), 1);
        counters.record_skipped(3);

        let stats = counters.snapshot("logger", 0.5, TaskPriority::LOW);
        assert_eq!(stats.name, "logger");
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.skipped_periods, 3);
        assert!(!stats.elevated);
    }
}
