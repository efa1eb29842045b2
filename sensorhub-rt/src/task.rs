//! Periodic task descriptions.

use std::fmt;
use std::time::Duration;

/// Error type a task body may return. Any error is logged and faults the
/// task's context.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

type Body = Box<dyn FnMut() -> Result<(), TaskError> + Send>;

/// Longest period a task may have.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Relative urgency of a task. Higher values are more urgent.
///
/// [`TaskPriority::BACKGROUND`] asks for no elevation at all: the context
/// runs under the default OS policy. Any other value asks the OS for a
/// real-time slot, mapped onto the platform's priority range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TaskPriority(pub u8);

impl TaskPriority {
    pub const BACKGROUND: Self = Self(0);
    pub const LOW: Self = Self(64);
    pub const NORMAL: Self = Self(128);
    pub const HIGH: Self = Self(192);
    pub const CRITICAL: Self = Self(255);

    /// Whether this priority asks for real-time elevation.
    pub const fn is_elevated(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BACKGROUND => write!(f, "background"),
            Self::LOW => write!(f, "low"),
            Self::NORMAL => write!(f, "normal"),
            Self::HIGH => write!(f, "high"),
            Self::CRITICAL => write!(f, "critical"),
            Self(p) => write!(f, "{}", p),
        }
    }
}

/// A unit of work run repeatedly at a fixed rate.
///
/// # Example
///
/// ```rust
/// use sensorhub_rt::{PeriodicTask, TaskPriority};
///
/// let task = PeriodicTask::new("heartbeat", 2.0, || {
///     println!("tick");
///     Ok(())
/// })
/// .priority(TaskPriority::BACKGROUND);
///
/// assert_eq!(task.name(), "heartbeat");
/// assert_eq!(task.rate_hz(), 2.0);
/// ```
pub struct PeriodicTask {
    pub(crate) name: String,
    pub(crate) rate_hz: f64,
    pub(crate) priority: TaskPriority,
    pub(crate) body: Body,
}

impl PeriodicTask {
    /// Describe a task running `body` `rate_hz` times per second.
    ///
    /// The rate is validated when the task is added to a scheduler.
    pub fn new<F>(name: impl Into<String>, rate_hz: f64, body: F) -> Self
    where
        F: FnMut() -> Result<(), TaskError> + Send + 'static,
    {
        Self {
            name: name.into(),
            rate_hz,
            priority: TaskPriority::default(),
            body: Box::new(body),
        }
    }

    /// Set the priority requested for this task's context.
    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn requested_priority(&self) -> TaskPriority {
        self.priority
    }

    /// Execute the body once on the calling thread.
    ///
    /// The scheduler does this every period; calling it directly is handy
    /// for exercising a task without timing.
    pub fn run_once(&mut self) -> Result<(), TaskError> {
        (self.body)()
    }

    /// Time between activations, `1 / rate_hz`.
    ///
    /// `None` when the rate is not finite, not positive, so high that the
    /// period rounds down to zero, or so low that the period exceeds
    /// [`MAX_PERIOD`].
    pub fn period(&self) -> Option<Duration> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.rate_hz)
            .ok()
            .filter(|period| !period.is_zero() && *period <= MAX_PERIOD)
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("rate_hz", &self.rate_hz)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::CRITICAL > TaskPriority::HIGH);
        assert!(TaskPriority::HIGH > TaskPriority::NORMAL);
        assert!(TaskPriority::NORMAL > TaskPriority::LOW);
        assert!(TaskPriority::LOW > TaskPriority::BACKGROUND);
    }

    #[test]
    fn test_background_is_not_elevated() {
        assert!(!TaskPriority::BACKGROUND.is_elevated());
        assert!(TaskPriority::LOW.is_elevated());
        assert!(TaskPriority(1).is_elevated());
    }

    #[test]
    fn test_default_priority_is_background() {
        let task = PeriodicTask::new("t", 1.0, || Ok(()));
        assert_eq!(task.requested_priority(), TaskPriority::BACKGROUND);
        let task = task.priority(TaskPriority::HIGH);
        assert_eq!(task.requested_priority(), TaskPriority::HIGH);
    }

    #[test]
    fn test_period_from_rate() {
        let task = PeriodicTask::new("t", 4.0, || Ok(()));
        assert_eq!(task.period(), Some(Duration::from_millis(250)));

        let slow = PeriodicTask::new("t", 0.2, || Ok(()));
        assert_eq!(slow.period(), Some(Duration::from_secs(5)));

        for rate in [0.0, -2.0, f64::NAN, f64::INFINITY, 1e300, 1e-19, f64::MIN_POSITIVE] {
            assert_eq!(PeriodicTask::new("t", rate, || Ok(())).period(), None);
        }

        let hourly = PeriodicTask::new("t", 1.0 / 3600.0, || Ok(()));
        assert!(hourly.period().is_some());
    }

    #[test]
    fn test_run_once_calls_body() {
        let mut calls = 0;
        let mut task = PeriodicTask::new("t", 1.0, move || {
            calls += 1;
            if calls > 1 {
                return Err("second call".into());
            }
            Ok(())
        });
        assert!(task.run_once().is_ok());
        assert!(task.run_once().is_err());
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(TaskPriority::NORMAL.to_string(), "normal");
        assert_eq!(TaskPriority(7).to_string(), "7");
    }
}
