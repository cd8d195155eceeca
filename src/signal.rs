use parking_lot::{Condvar, Mutex};

struct State {
    count: usize,
    closed: bool,
}

/// Counting semaphore.
///
/// Every state transition goes through `post`, `wait` or `try_wait`, each of
/// which checks and updates the count under one lock. `try_get_count` is a
/// diagnostic peek and must not drive a decrement.
pub struct AvailabilitySignal {
    state: Mutex<State>,
    cond: Condvar,
}

impl AvailabilitySignal {
    pub fn new() -> Self {
        Self::with_count(0)
    }

    pub fn with_count(count: usize) -> Self {
        Self {
            state: Mutex::new(State {
                count,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Increments the count and wakes one waiter.
    pub fn post(&self) {
        let mut state = self.state.lock();
        state.count += 1;
        drop(state);
        self.cond.notify_one();
    }

    /// Blocks until the count is positive, then decrements it.
    ///
    /// Returns `false` without decrementing if the signal was closed and the
    /// count is zero.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while state.count == 0 {
            if state.closed {
                return false;
            }
            self.cond.wait(&mut state);
        }
        state.count -= 1;
        true
    }

    /// Decrements the count if it is positive.
    pub fn try_wait(&self) -> bool {
        let mut state = self.state.lock();
        if state.count == 0 {
            return false;
        }
        state.count -= 1;
        true
    }

    /// No further posts are expected; wakes every waiter. Units already
    /// posted can still be taken.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.cond.notify_all();
    }

    pub fn try_get_count(&self) -> usize {
        self.state.lock().count
    }
}

impl Default for AvailabilitySignal {
    fn default() -> Self {
        Self::new()
    }
}
