//! Rate-limited worker pool
//!
//! [`RateLimitedPool`] wraps a plain [`WorkerPool`] with an
//! [`AdmissionGate`] and an [`IntervalTimer`]. Every submission lazily
//! starts the timer, passes the gate (blocking once the quota for the
//! current interval is used up) and only then enters the worker queue.

use super::config::PoolConfig;
use super::gate::AdmissionGate;
use super::handle::TaskHandle;
use super::stats::PoolStats;
use super::timer::IntervalTimer;
use super::worker::WorkerPool;
use super::{PoolError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a [`RateLimitedPool`]
///
/// ```text
/// Created ──submit──▶ Accepting ──shutdown(true)──▶ Draining ──▶ Stopped
///    │                    │                                        ▲
///    └────────────────────┴──────────shutdown(false)───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting work, interval timer not started yet
    Created,
    /// Accepting work, interval timer running
    Accepting,
    /// Shutdown in progress, waiting for queued tasks
    Draining,
    /// No longer accepting work
    Stopped,
}

/// Worker pool that admits at most `max_per_interval` tasks per interval
///
/// Dropping the pool performs `shutdown(true)`, so a pool held in a scope is
/// torn down exactly once on every exit path.
///
/// # Example
///
/// ```
/// use throttlepool::{PoolConfig, RateLimitedPool};
/// use std::time::Duration;
///
/// let config = PoolConfig::builder()
///     .max_workers(2)
///     .max_per_interval(10)
///     .interval(Duration::from_secs(60))
///     .build()
///     .unwrap();
///
/// let pool = RateLimitedPool::new(config).unwrap();
/// let handles: Vec<_> = (0..5)
///     .map(|i| pool.submit(move || i * i).unwrap())
///     .collect();
///
/// pool.shutdown(true);
/// let squares: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
/// assert_eq!(squares, vec![0, 1, 4, 9, 16]);
/// ```
pub struct RateLimitedPool {
    config: PoolConfig,
    workers: WorkerPool,
    gate: Arc<AdmissionGate>,
    timer: IntervalTimer,
    state: Mutex<PoolState>,
    submitted: AtomicU64,
}

impl RateLimitedPool {
    /// Create the pool and spawn its worker threads
    ///
    /// The interval timer is not started until the first submission.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if the worker threads cannot be created.
    pub fn new(config: PoolConfig) -> Result<Self> {
        let workers = WorkerPool::new(&config)?;
        let gate = Arc::new(AdmissionGate::new(config.max_per_interval()));

        let reset_gate = Arc::clone(&gate);
        let timer = IntervalTimer::new(
            config.interval(),
            format!("{}-timer", config.thread_name_prefix()),
            move || reset_gate.reset(),
        );

        tracing::info!(
            "Rate-limited pool created: {} workers, {} tasks per {:?}",
            config.max_workers(),
            config.max_per_interval(),
            config.interval()
        );

        Ok(RateLimitedPool {
            config,
            workers,
            gate,
            timer,
            state: Mutex::new(PoolState::Created),
            submitted: AtomicU64::new(0),
        })
    }

    /// Submit a task, blocking while the quota for this interval is used up
    ///
    /// # Errors
    ///
    /// - [`PoolError::ShutDown`]: shutdown began before or while waiting
    /// - [`PoolError::Broken`]: a worker initializer failed
    /// - [`PoolError::Spawn`]: the interval timer thread could not start
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_accepting()?;
        self.gate.admit()?;
        self.enqueue(task)
    }

    /// Submit a task only if quota is left in the current interval
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::QuotaExhausted`] instead of blocking, plus the
    /// errors of [`submit`](Self::submit).
    pub fn try_submit<F, T>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_accepting()?;
        if !self.gate.try_admit()? {
            return Err(PoolError::QuotaExhausted);
        }
        self.enqueue(task)
    }

    /// Stop the timer and the workers
    ///
    /// With `wait`, blocks until every queued and running task finished,
    /// including when shutdown was already begun by another call. Without
    /// it, returns at once and accepted tasks finish in the background.
    /// Submitters blocked on the quota or on a full queue are released with
    /// [`PoolError::ShutDown`]. The state change happens only once.
    ///
    /// Dropping the last reference from inside one of the pool's own tasks
    /// does not wait for that task; the remaining workers are still joined.
    pub fn shutdown(&self, wait: bool) {
        let first = {
            let mut state = self.state.lock();
            match *state {
                PoolState::Draining | PoolState::Stopped => false,
                PoolState::Created | PoolState::Accepting => {
                    *state = if wait {
                        PoolState::Draining
                    } else {
                        PoolState::Stopped
                    };
                    // Closed under the state lock: once the state reads
                    // Draining or Stopped no enqueue can succeed
                    self.workers.close();
                    self.gate.close();
                    true
                }
            }
        };

        if first {
            tracing::info!("Shutting down rate-limited pool (wait: {})", wait);
            self.timer.stop();
        }
        self.workers.shutdown(wait);

        if first || wait {
            *self.state.lock() = PoolState::Stopped;
        }
        if first {
            tracing::info!(
                "Rate-limited pool stopped after {} submissions",
                self.submitted.load(Ordering::Relaxed)
            );
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// The configuration the pool was created with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Snapshot of the pool's counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            throttled: self.gate.throttled(),
            resets: self.gate.resets(),
            completed: self.workers.completed(),
            panicked: self.workers.panicked(),
            active: self.workers.active(),
            admitted_this_interval: self.gate.counter(),
        }
    }

    fn ensure_accepting(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            PoolState::Draining | PoolState::Stopped => Err(PoolError::ShutDown),
            PoolState::Created | PoolState::Accepting => {
                if self.timer.start()? {
                    tracing::debug!("Quota window started");
                }
                *state = PoolState::Accepting;
                Ok(())
            }
        }
    }

    fn enqueue<F, T>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.workers.submit(task)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }
}

impl Drop for RateLimitedPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}
