//! Admission gate: a counter with a threshold that blocks submitters
//!
//! The gate admits callers while fewer than `limit` admissions happened since
//! the last [`reset`](AdmissionGate::reset). Once the quota is used up, callers
//! of [`admit`](AdmissionGate::admit) park on a condition variable until the
//! interval timer resets the counter or the gate is closed.
//!
//! The limit check and the increment happen under one lock, so an interval
//! never admits more than `limit` callers even when resets race with
//! concurrent submitters.

use super::{PoolError, Result};
use parking_lot::{Condvar, Mutex};

struct GateState {
    /// Admissions since the last reset
    counter: usize,
    /// Set once at shutdown, wakes every waiter with an error
    closed: bool,
    resets: u64,
    throttled: u64,
}

/// Counter-plus-threshold guard in front of the worker queue
///
/// # Example
///
/// ```
/// use throttlepool::AdmissionGate;
///
/// let gate = AdmissionGate::new(2);
/// gate.admit().unwrap();
/// gate.admit().unwrap();
///
/// // Quota used up: a non-blocking attempt is refused
/// assert!(!gate.try_admit().unwrap());
///
/// gate.reset();
/// assert!(gate.try_admit().unwrap());
/// ```
pub struct AdmissionGate {
    limit: usize,
    state: Mutex<GateState>,
    released: Condvar,
}

impl AdmissionGate {
    /// Create a gate admitting `limit` callers per interval
    ///
    /// `limit` must be at least 1; [`PoolConfig`](super::PoolConfig) enforces
    /// this for gates created by the pool. A zero limit blocks every caller
    /// until the gate is closed.
    pub fn new(limit: usize) -> Self {
        AdmissionGate {
            limit,
            state: Mutex::new(GateState {
                counter: 0,
                closed: false,
                resets: 0,
                throttled: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Admit one caller, blocking while the quota is exhausted
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] if the gate is closed before or while
    /// the caller waits.
    pub fn admit(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::ShutDown);
        }

        if state.counter >= self.limit {
            state.throttled += 1;
            tracing::debug!(
                "Quota of {} exhausted, waiting for the next interval",
                self.limit
            );
            while state.counter >= self.limit && !state.closed {
                self.released.wait(&mut state);
            }
            if state.closed {
                return Err(PoolError::ShutDown);
            }
        }

        state.counter += 1;
        Ok(())
    }

    /// Admit one caller if quota is left, without blocking
    ///
    /// Returns `Ok(false)` when the quota for the current interval is used up.
    pub fn try_admit(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::ShutDown);
        }
        if state.counter >= self.limit {
            return Ok(false);
        }
        state.counter += 1;
        Ok(true)
    }

    /// Start a new interval: zero the counter and wake blocked callers
    ///
    /// Woken callers re-check the quota, so at most `limit` of them proceed.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let previous = state.counter;
        state.counter = 0;
        state.resets += 1;
        drop(state);

        let woken = self.released.notify_all();
        tracing::trace!("Gate reset after {} admissions, woke {} waiters", previous, woken);
    }

    /// Refuse all further admissions and release every waiter
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.released.notify_all();
    }

    /// Admissions since the last reset
    pub fn counter(&self) -> usize {
        self.state.lock().counter
    }

    /// Admissions allowed per interval
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of resets performed so far
    pub fn resets(&self) -> u64 {
        self.state.lock().resets
    }

    /// Number of admissions that had to wait for a reset
    pub fn throttled(&self) -> u64 {
        self.state.lock().throttled
    }
}
