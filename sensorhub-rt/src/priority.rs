//! Best-effort real-time scheduling for the calling thread.

use thiserror::Error;

use crate::task::TaskPriority;

/// Why a priority request could not be honoured.
#[derive(Debug, Error)]
pub enum PriorityError {
    /// This platform has no supported real-time policy.
    #[error("real-time scheduling is not supported on this platform")]
    Unsupported,

    /// The OS refused the request, typically for lack of privilege.
    #[error("failed to set real-time priority: {0}")]
    Os(#[from] std::io::Error),
}

/// Map a requested priority onto an OS priority range.
///
/// `1` lands on `min`, `255` on `max`, linearly in between. `0` never
/// reaches this function.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn fifo_priority(requested: TaskPriority, min: i32, max: i32) -> i32 {
    let requested = i64::from(requested.0.max(1));
    let span = i64::from(max - min);
    let offset = (requested - 1) * span / 254;
    min + offset as i32
}

/// Ask the OS to run the calling thread under a real-time FIFO policy.
///
/// Returns `Ok(false)` without touching the thread for
/// [`TaskPriority::BACKGROUND`], and `Ok(true)` once elevation succeeded.
/// Callers are expected to log a failure and carry on at normal priority.
#[cfg(target_os = "linux")]
pub fn elevate_current_thread(priority: TaskPriority) -> Result<bool, PriorityError> {
    if !priority.is_elevated() {
        return Ok(false);
    }

    // SAFETY: these calls take plain integers and have no preconditions.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    if min < 0 || max < 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    // SAFETY: sched_param is plain old data; all-zero is a valid value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = fifo_priority(priority, min, max);

    // SAFETY: pthread_self() is always a valid handle for the calling
    // thread and `param` outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(std::io::Error::from_raw_os_error(rc).into());
    }
    Ok(true)
}

/// Real-time elevation is only implemented for Linux.
#[cfg(not(target_os = "linux"))]
pub fn elevate_current_thread(priority: TaskPriority) -> Result<bool, PriorityError> {
    if !priority.is_elevated() {
        return Ok(false);
    }
    Err(PriorityError::Unsupported)
}
