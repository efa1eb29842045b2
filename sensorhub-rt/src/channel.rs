//! Thread-safe fixed-capacity FIFO with blocking, non-blocking and timed
//! consumption.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::error::CapacityError;
use crate::stop::StopSignal;

/// What a full channel does with a new item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Producers wait for space.
    #[default]
    Block,
    /// The oldest unread item is discarded to make room.
    Overwrite,
}

/// The channel was closed; the rejected item is handed back.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Recover the item that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SendError(..)")
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sending on a closed channel")
    }
}

impl<T> std::error::Error for SendError<T> {}

/// A timed push did not complete; the rejected item is handed back.
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum SendTimeoutError<T> {
    /// No space became available before the timeout.
    Timeout(T),
    /// The channel was closed.
    Closed(T),
}

impl<T> SendTimeoutError<T> {
    /// Recover the item that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            SendTimeoutError::Timeout(item) | SendTimeoutError::Closed(item) => item,
        }
    }

    /// Whether the push gave up because of the timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SendTimeoutError::Timeout(_))
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTimeoutError::Timeout(_) => f.write_str("Timeout(..)"),
            SendTimeoutError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTimeoutError::Timeout(_) => f.write_str("timed out waiting for channel space"),
            SendTimeoutError::Closed(_) => f.write_str("sending on a closed channel"),
        }
    }
}

impl<T> std::error::Error for SendTimeoutError<T> {}

/// The channel is closed and drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("receiving on a closed and empty channel")]
pub struct RecvError;

/// A timed pop did not return an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvTimeoutError {
    /// Nothing arrived before the timeout.
    #[error("timed out waiting for an item")]
    Timeout,
    /// The channel is closed and drained.
    #[error("receiving on a closed and empty channel")]
    Closed,
}

/// Ring storage. Only ever touched with the channel lock held.
struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
    closed: bool,
    evicted: u64,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
            closed: false,
            evicted: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Insert at the tail. When full, the slot at the tail is the oldest
    /// item; replacing it and moving head along keeps the newest `capacity`.
    fn push_back(&mut self, item: T) {
        let cap = self.capacity();
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % cap;
        if self.count == cap {
            self.head = self.tail;
            self.evicted += 1;
        } else {
            self.count += 1;
        }
    }

    fn pop_front(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        item
    }
}

/// A bounded FIFO queue shared between producer and consumer threads.
///
/// One internal lock guards the ring; it is held only for index bookkeeping
/// and moving the item in or out, never while running caller code.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sensorhub_rt::{BoundedChannel, OverflowPolicy, RecvTimeoutError};
///
/// let channel = BoundedChannel::new(2, OverflowPolicy::Overwrite).unwrap();
/// channel.push("a").unwrap();
/// channel.push("b").unwrap();
/// channel.push("c").unwrap(); // evicts "a"
///
/// assert_eq!(channel.try_pop(), Some("b"));
/// assert_eq!(channel.pop(), Ok("c"));
/// assert_eq!(
///     channel.pop_timed(Duration::from_millis(10)),
///     Err(RecvTimeoutError::Timeout)
/// );
/// ```
pub struct BoundedChannel<T> {
    ring: Mutex<Ring<T>>,
    /// Signalled when an item is added ("data available").
    not_empty: Condvar,
    /// Signalled when an item is removed ("space available").
    not_full: Condvar,
    policy: OverflowPolicy,
}

impl<T> BoundedChannel<T> {
    /// Create a channel holding at most `capacity` items.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError);
        }
        Ok(Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            policy,
        })
    }

    /// Push an item, waiting for space if the channel is full.
    ///
    /// Under [`OverflowPolicy::Overwrite`] this never waits: a full channel
    /// silently drops its oldest item instead.
    pub fn push(&self, item: T) -> Result<(), SendError<T>> {
        let mut ring = self.ring.lock();
        if self.policy == OverflowPolicy::Block {
            while ring.is_full() && !ring.closed {
                self.not_full.wait(&mut ring);
            }
        }
        if ring.closed {
            return Err(SendError(item));
        }
        ring.push_back(item);
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push an item, giving up if no space frees up within `timeout`.
    ///
    /// Under [`OverflowPolicy::Overwrite`] this behaves like [`push`](Self::push)
    /// and never times out.
    pub fn push_timed(&self, item: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut ring = self.ring.lock();
        if self.policy == OverflowPolicy::Block {
            while ring.is_full() && !ring.closed {
                match deadline {
                    Some(deadline) => {
                        if self.not_full.wait_until(&mut ring, deadline).timed_out() {
                            break;
                        }
                    }
                    None => self.not_full.wait(&mut ring),
                }
            }
        }
        if ring.closed {
            return Err(SendTimeoutError::Closed(item));
        }
        if ring.is_full() && self.policy == OverflowPolicy::Block {
            return Err(SendTimeoutError::Timeout(item));
        }
        ring.push_back(item);
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, waiting until one is available.
    ///
    /// Returns [`RecvError`] once the channel is closed and drained.
    pub fn pop(&self) -> Result<T, RecvError> {
        let mut ring = self.ring.lock();
        while ring.count == 0 && !ring.closed {
            self.not_empty.wait(&mut ring);
        }
        let item = ring.pop_front().ok_or(RecvError)?;
        drop(ring);
        self.not_full.notify_one();
        Ok(item)
    }

    /// Remove the oldest item if there is one. Never blocks.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.ring.lock().pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Remove the oldest item, waiting at most `timeout` for one to arrive.
    pub fn pop_timed(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut ring = self.ring.lock();
        while ring.count == 0 && !ring.closed {
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut ring, deadline).timed_out() {
                        break;
                    }
                }
                None => self.not_empty.wait(&mut ring),
            }
        }
        match ring.pop_front() {
            Some(item) => {
                drop(ring);
                self.not_full.notify_one();
                Ok(item)
            }
            None if ring.closed => Err(RecvTimeoutError::Closed),
            None => Err(RecvTimeoutError::Timeout),
        }
    }

    /// Close the channel, releasing every blocked producer and consumer.
    ///
    /// Pushes fail from now on. Items already queued can still be popped;
    /// once they are gone, pops report the channel as closed.
    pub fn close(&self) {
        self.ring.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.ring.lock().closed
    }

    /// Number of queued items at this instant.
    ///
    /// Other threads may change it before the caller looks at the result.
    pub fn size(&self) -> usize {
        self.ring.lock().count
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Whether the channel held no items at this instant.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the channel was full at this instant.
    pub fn is_full(&self) -> bool {
        self.ring.lock().is_full()
    }

    /// The overflow policy chosen at construction.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of unread items discarded by the overwrite policy so far.
    pub fn evicted(&self) -> u64 {
        self.ring.lock().evicted
    }
}

impl<T: Send + 'static> BoundedChannel<T> {
    /// Close this channel when `stop` fires.
    ///
    /// Only a weak reference is kept, so the hook does not extend the
    /// channel's lifetime.
    pub fn close_on(self: &Arc<Self>, stop: &StopSignal) {
        let weak = Arc::downgrade(self);
        stop.on_trigger(move || {
            if let Some(channel) = weak.upgrade() {
                channel.close();
            }
        });
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("BoundedChannel")
            .field("capacity", &ring.capacity())
            .field("size", &ring.count)
            .field("policy", &self.policy)
            .field("closed", &ring.closed)
            .finish()
    }
}
