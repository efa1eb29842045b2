//! Cooperative cancellation token shared by every blocking context.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    /// Hooks still waiting for the trigger. Also the mutex waiters park on.
    hooks: Mutex<Vec<Hook>>,
    cond: Condvar,
}

/// A one-shot stop request shared between threads.
///
/// Clones share the same state. Once triggered, a signal stays triggered for
/// its whole lifetime; there is no reset. Create a fresh signal for each run.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sensorhub_rt::StopSignal;
///
/// let stop = StopSignal::new();
/// let worker_stop = stop.clone();
///
/// let worker = std::thread::spawn(move || {
///     // Sleeps up to 10s, but returns as soon as the signal fires
///     worker_stop.wait_timeout(Duration::from_secs(10))
/// });
///
/// stop.trigger();
/// assert!(worker.join().unwrap());
/// ```
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    ///
    /// Wakes every thread waiting on this signal and runs registered hooks.
    /// Returns `true` for the call that actually flipped the signal, `false`
    /// if it had already been triggered.
    pub fn trigger(&self) -> bool {
        let hooks = {
            let mut hooks = self.inner.hooks.lock();
            if self.inner.triggered.swap(true, Ordering::SeqCst) {
                return false;
            }
            self.inner.cond.notify_all();
            std::mem::take(&mut *hooks)
        };

        // Hooks run outside the lock so they may touch the signal themselves
        for hook in hooks {
            hook();
        }
        true
    }

    /// Whether a stop has been requested.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Block until the signal fires or `deadline` passes.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut hooks = self.inner.hooks.lock();
        while !self.is_triggered() {
            if self.inner.cond.wait_until(&mut hooks, deadline).timed_out() {
                return self.is_triggered();
            }
        }
        true
    }

    /// Block until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        let mut hooks = self.inner.hooks.lock();
        while !self.is_triggered() {
            self.inner.cond.wait(&mut hooks);
        }
    }

    /// Run `hook` once when the signal fires.
    ///
    /// If the signal has already fired, the hook runs immediately on the
    /// calling thread.
    pub fn on_trigger<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut hooks = self.inner.hooks.lock();
            if !self.is_triggered() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_trigger_is_one_shot() {
        let stop = StopSignal::new();
        assert!(!stop.is_triggered());
        assert!(stop.trigger());
        assert!(!stop.trigger());
        assert!(stop.is_triggered());
    }

    #[test]
    fn test_wait_timeout_expires_without_trigger() {
        let stop = StopSignal::new();
        let started = Instant::now();

        assert!(!stop.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_trigger_wakes_all_waiters() {
        let stop = StopSignal::new();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let s = stop.clone();
                thread::spawn(move || s.wait_timeout(Duration::from_secs(30)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        stop.trigger();

        for w in waiters {
            assert!(w.join().unwrap());
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_hooks_run_exactly_once() {
        let stop = StopSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        stop.on_trigger(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        stop.trigger();
        stop.trigger();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_registered_after_trigger_runs_immediately() {
        let stop = StopSignal::new();
        stop.trigger();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        stop.on_trigger(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_past_deadline_returns_immediately() {
        let stop = StopSignal::new();
        let past = Instant::now();
        thread::sleep(Duration::from_millis(2));

        let started = Instant::now();
        assert!(!stop.wait_until(past));
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
