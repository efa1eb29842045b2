//! Single-slot holder for the most recent value.

use parking_lot::Mutex;

struct Slot<T> {
    value: Option<T>,
    sequence: u64,
}

/// Holds the freshest published value for any number of readers.
///
/// One writer publishes at its own pace; readers copy the current value out
/// without ever blocking the writer for longer than the copy. There is no
/// history: a reader that falls behind simply sees the newest value the next
/// time it looks.
///
/// Every publish bumps a sequence number so readers can tell a fresh value
/// from one they have already processed.
///
/// # Example
///
/// ```rust
/// use sensorhub_rt::LatestValueCell;
///
/// let cell = LatestValueCell::new();
/// assert_eq!(cell.read(), None);
///
/// cell.publish(1);
/// cell.publish(2);
/// assert_eq!(cell.read_versioned(), Some((2, 2)));
/// ```
pub struct LatestValueCell<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> LatestValueCell<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                sequence: 0,
            }),
        }
    }

    /// Replace the stored value and return its sequence number.
    pub fn publish(&self, value: T) -> u64 {
        let mut slot = self.slot.lock();
        slot.value = Some(value);
        slot.sequence += 1;
        slot.sequence
    }

    /// Number of publishes so far. Zero means nothing was ever published.
    pub fn sequence(&self) -> u64 {
        self.slot.lock().sequence
    }
}

impl<T: Clone> LatestValueCell<T> {
    /// Copy of the newest value, or `None` before the first publish.
    pub fn read(&self) -> Option<T> {
        self.slot.lock().value.clone()
    }

    /// Copy of the newest value together with its sequence number.
    pub fn read_versioned(&self) -> Option<(T, u64)> {
        let slot = self.slot.lock();
        slot.value.clone().map(|value| (value, slot.sequence))
    }
}

impl<T> Default for LatestValueCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LatestValueCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("LatestValueCell")
            .field("sequence", &slot.sequence)
            .field("populated", &slot.value.is_some())
            .finish()
    }
}
