//! # sensorhub-rt
//!
//! The concurrency core of the sensorhub. Three pieces, each usable on its own:
//!
//! - [`BoundedChannel`]: a fixed-capacity FIFO shared between threads, with
//!   blocking, non-blocking and timed consumption and an optional
//!   overwrite-on-full policy.
//! - [`LatestValueCell`]: a single-slot "freshest snapshot" holder that
//!   decouples one fast writer from any number of slow readers.
//! - [`Scheduler`]: runs each [`PeriodicTask`] on its own OS thread at a fixed
//!   rate using absolute deadlines, so execution jitter never accumulates
//!   into drift.
//!
//! All blocking points honour a shared [`StopSignal`], so shutdown releases
//! every waiter promptly.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sensorhub_rt::{LatestValueCell, PeriodicTask, Scheduler, TaskPriority};
//!
//! let cell = Arc::new(LatestValueCell::new());
//! let writer = cell.clone();
//! let mut counter = 0u32;
//!
//! let mut scheduler = Scheduler::new();
//! scheduler
//!     .add(
//!         PeriodicTask::new("counter", 50.0, move || {
//!             counter += 1;
//!             writer.publish(counter);
//!             Ok(())
//!         })
//!         .priority(TaskPriority::LOW),
//!     )
//!     .unwrap();
//!
//! scheduler.start().unwrap();
//! std::thread::sleep(Duration::from_millis(100));
//! scheduler.stop();
//!
//! assert!(cell.read().unwrap_or(0) >= 1);
//! ```

mod cell;
mod channel;
mod error;
mod priority;
mod scheduler;
mod stats;
mod stop;
mod task;

pub use cell::LatestValueCell;
pub use channel::{
    BoundedChannel, OverflowPolicy, RecvError, RecvTimeoutError, SendError, SendTimeoutError,
};
pub use error::{CapacityError, SchedulerError};
pub use priority::{elevate_current_thread, PriorityError};
pub use scheduler::{OverrunPolicy, Scheduler};
pub use stats::{TaskState, TaskStats};
pub use stop::StopSignal;
pub use task::{PeriodicTask, TaskError, TaskPriority, MAX_PERIOD};
