//! Repeating interval timer
//!
//! [`IntervalTimer`] runs a callback once per interval on a dedicated
//! background thread and keeps rescheduling itself until stopped. The pool
//! owns one timer and joins its thread at shutdown.

use super::Result;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

struct TimerState {
    running: bool,
    /// Identifies the live schedule; a schedule thread exits once it no
    /// longer matches, even if the timer was restarted in between
    generation: u64,
    thread: Option<JoinHandle<()>>,
    fired: u64,
}

struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Self-rescheduling timer firing a callback every `interval`
///
/// # Example
///
/// ```
/// use throttlepool::IntervalTimer;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&ticks);
/// let timer = IntervalTimer::new(Duration::from_millis(10), "doc", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// timer.start().unwrap();
/// std::thread::sleep(Duration::from_millis(55));
/// timer.stop();
/// assert!(ticks.load(Ordering::SeqCst) >= 1);
/// ```
pub struct IntervalTimer {
    interval: Duration,
    name: String,
    callback: Callback,
    shared: Arc<Shared>,
}

impl IntervalTimer {
    /// Create a stopped timer; `name` becomes the schedule thread's name
    pub fn new<F>(interval: Duration, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        IntervalTimer {
            interval,
            name: name.into(),
            callback: Arc::new(callback),
            shared: Arc::new(Shared {
                state: Mutex::new(TimerState {
                    running: false,
                    generation: 0,
                    thread: None,
                    fired: 0,
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Start the schedule
    ///
    /// Returns `Ok(false)` without doing anything if the timer is already
    /// running, so repeated calls never create a second schedule.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`](super::PoolError::Spawn) if the schedule
    /// thread cannot be created.
    pub fn start(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if state.running {
            return Ok(false);
        }

        state.generation += 1;
        let generation = state.generation;
        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.callback);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_schedule(shared, callback, interval, generation))?;

        state.thread = Some(handle);
        state.running = true;
        drop(state);

        tracing::debug!("Interval timer {} started ({:?})", self.name, self.interval);
        Ok(true)
    }

    /// Stop the schedule and wait for its thread to exit
    ///
    /// Safe to call any number of times. Must not be called from inside the
    /// timer callback.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        let was_running = state.running;
        state.running = false;
        let handle = state.thread.take();
        drop(state);

        self.shared.wakeup.notify_all();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Interval timer {} thread panicked", self.name);
            }
        }

        if was_running {
            tracing::debug!("Interval timer {} stopped", self.name);
        }
    }

    /// Whether a schedule is active
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Number of times the callback has fired
    pub fn fired(&self) -> u64 {
        self.shared.state.lock().fired
    }

    /// The configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_schedule(shared: Arc<Shared>, callback: Callback, interval: Duration, generation: u64) {
    let is_live = |state: &TimerState| state.running && state.generation == generation;

    loop {
        let deadline = Instant::now() + interval;
        let mut state = shared.state.lock();
        while is_live(&state) && Instant::now() < deadline {
            shared.wakeup.wait_until(&mut state, deadline);
        }
        if !is_live(&state) {
            break;
        }
        state.fired += 1;
        drop(state);

        // A failing callback must not end the schedule
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            tracing::error!(
                "Interval timer callback panicked: {}",
                super::handle::panic_message(panic.as_ref())
            );
        }
    }
}
