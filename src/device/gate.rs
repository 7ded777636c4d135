//! Pause/close gate shared between an owner and a worker thread

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    closed: bool,
}

/// A resumable stop sign for a worker loop.
///
/// The worker calls [`Gate::wait_open`] at its suspension points; the owner
/// flips `pause`/`resume`/`close` from any thread. Closing always wins: it
/// wakes every waiter and cannot be undone.
#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pause(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.paused = true;
        }
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.cond.notify_all();
    }

    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.paused = false;
        drop(state);
        self.cond.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Block while paused. Returns `false` once the gate is closed.
    pub fn wait_open(&self) -> bool {
        let state = self
            .cond
            .wait_while(self.lock(), |s| s.paused && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        !state.closed
    }

    /// Sleep for `dur`, returning early with `false` if the gate closes
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut state = self.lock();
        loop {
            if state.closed {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
