//! # Counting Semaphore
//!
//! Mutex + condvar semaphore used as the parking spot of a barrier waiter.
//! Starts at zero: a wait parks until somebody posts.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A counting semaphore.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with a count of zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count and wakes one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Blocks until the count is positive, then decrements it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.condvar.wait(&mut count);
        }
        *count -= 1;
    }

    /// Like [`Self::wait`], giving up after `timeout`.
    ///
    /// Returns true if a post was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count == 0 {
            if self.condvar.wait_until(&mut count, deadline).timed_out() && *count == 0 {
                return false;
            }
        }
        *count -= 1;
        true
    }

    /// Decrements the count if it is positive, without blocking.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Current count.
    #[must_use]
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}
