use std::time::Instant;

use parking_lot::{Condvar, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arrival {
    /// Last to arrive; released everyone and stamped the start time.
    Leader,
    Follower,
    /// The barrier was cancelled before every party arrived.
    Cancelled,
}

struct State {
    arrived: usize,
    released_at: Option<Instant>,
    cancelled: bool,
}

/// One-shot rendezvous for `parties` threads.
///
/// Only used to line up the start of the timed phase; the pipeline is
/// correct without it.
pub struct StartBarrier {
    parties: usize,
    state: Mutex<State>,
    cond: Condvar,
}

impl StartBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(State {
                arrived: 0,
                released_at: None,
                cancelled: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn wait(&self) -> Arrival {
        let mut state = self.state.lock();
        if state.cancelled {
            return Arrival::Cancelled;
        }
        if state.released_at.is_some() {
            return Arrival::Follower;
        }

        state.arrived += 1;
        if state.arrived >= self.parties {
            state.released_at = Some(Instant::now());
            drop(state);
            self.cond.notify_all();
            return Arrival::Leader;
        }

        while state.released_at.is_none() && !state.cancelled {
            self.cond.wait(&mut state);
        }
        if state.released_at.is_some() {
            Arrival::Follower
        } else {
            Arrival::Cancelled
        }
    }

    /// Releases every waiter without starting. Used when not every party
    /// could be spawned.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if state.released_at.is_none() {
            state.cancelled = true;
        }
        drop(state);
        self.cond.notify_all();
    }

    pub fn released_at(&self) -> Option<Instant> {
        self.state.lock().released_at
    }
}
