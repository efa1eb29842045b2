//! Error types for the concurrency core.

use thiserror::Error;

/// A channel was constructed with no room for any item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel capacity must be at least 1")]
pub struct CapacityError;

/// Errors reported by the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task declared a rate that does not give a usable period.
    #[error("task '{name}' has invalid rate {rate_hz} Hz (must be finite and > 0)")]
    InvalidRate { name: String, rate_hz: f64 },

    /// Task names become thread names and may not contain NUL bytes.
    #[error("task name {0:?} contains a NUL byte")]
    InvalidName(String),

    /// `start()` was called with nothing registered.
    #[error("no tasks registered")]
    NoTasks,

    /// The scheduler is already running; tasks are fixed for a run.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// The scheduler was stopped and cannot be restarted.
    #[error("scheduler has been stopped")]
    Stopped,

    /// The OS refused to create a thread for a task.
    #[error("failed to spawn context for task '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
