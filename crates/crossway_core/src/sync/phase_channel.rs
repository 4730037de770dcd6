//! # Phase Channel
//!
//! Unbounded blocking queue: one producer, any number of consumers.
//!
//! - `send` never blocks and never fails.
//! - `receive` blocks until a value is available, then moves it out.
//! - A value is delivered to exactly one receiver. When several receivers
//!   are parked, whichever wakes first takes the front value.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Blocking FIFO hand-off between threads.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct PhaseChannel<T> {
    /// Pending values, oldest first.
    queue: Mutex<VecDeque<T>>,
    /// Signalled once per `send`.
    not_empty: Condvar,
}

impl<T> PhaseChannel<T> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends a value and wakes one parked receiver.
    pub fn send(&self, value: T) {
        let mut queue = self.queue.lock();
        queue.push_back(value);
        self.not_empty.notify_one();
    }

    /// Blocks until a value is available and returns it.
    ///
    /// Blocks forever if nothing is ever sent. Use
    /// [`PhaseChannel::receive_timeout`] for a bounded wait.
    pub fn receive(&self) -> T {
        let mut queue = self.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                return value;
            }
            // Lock is released while parked; spurious wakes loop back here.
            self.not_empty.wait(&mut queue);
        }
    }

    /// Blocks for at most `timeout` waiting for a value.
    ///
    /// Returns `None` if the deadline passes with the channel still empty.
    /// A timeout too large to represent as a deadline waits indefinitely.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.receive());
        };
        let mut queue = self.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                return Some(value);
            }
            if self.not_empty.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    /// Pops the front value without blocking.
    pub fn try_receive(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }

    /// Number of pending values. Advisory only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if no values are pending. Advisory only.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<T> Default for PhaseChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PhaseChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseChannel")
            .field("pending", &self.len())
            .finish()
    }
}
