//! Plain fixed-size worker pool
//!
//! [`WorkerPool`] owns a set of named worker threads that consume jobs from
//! one bounded queue. It knows nothing about rate limiting; the
//! [`RateLimitedPool`](super::RateLimitedPool) wraps it and decides when a
//! task may enter the queue.
//!
//! Shutdown closes the queue by dropping the sending half and wakes every
//! submitter waiting for queue space. Workers finish whatever is still queued
//! and exit once the channel is empty.

use super::config::{Initializer, PoolConfig};
use super::handle::{TaskHandle, panic_message, task_channel};
use super::{PoolError, Result, TaskError};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle, ThreadId};

/// What happened when a worker ran a job
enum JobStatus {
    Completed,
    Panicked,
}

type Job = Box<dyn FnOnce() -> JobStatus + Send + 'static>;

/// State shared by every worker thread
struct Shared {
    /// Sending half of the queue, `None` once shutdown began
    intake: Mutex<Option<SyncSender<Job>>>,
    /// Signalled when a queue slot frees up or the intake closes
    space: Condvar,
    receiver: Mutex<Receiver<Job>>,
    /// Workers that have not left their run loop yet
    live: Mutex<usize>,
    exited: Condvar,
    broken: AtomicBool,
    active: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn wake_submitters(&self) {
        // Taking the lock orders the wakeup after a submitter's failed try_send
        let _intake = self.intake.lock();
        self.space.notify_all();
    }
}

#[derive(Default)]
struct WorkerThreads {
    handles: Vec<JoinHandle<()>>,
    ids: Vec<ThreadId>,
}

/// A fixed set of reusable worker threads fed by a bounded queue
///
/// # Example
///
/// ```
/// use throttlepool::{PoolConfig, WorkerPool};
///
/// let config = PoolConfig::builder().max_workers(2).build().unwrap();
/// let pool = WorkerPool::new(&config).unwrap();
///
/// let handle = pool.submit(|| "hello").unwrap();
/// assert_eq!(handle.join().unwrap(), "hello");
/// pool.shutdown(true);
/// ```
pub struct WorkerPool {
    threads: Mutex<WorkerThreads>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Spawn `config.max_workers()` threads sharing a queue of
    /// `config.queue_capacity()` slots
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a thread cannot be created; workers
    /// spawned before the failure are shut down again.
    pub fn new(config: &PoolConfig) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel(config.queue_capacity());
        let shared = Arc::new(Shared {
            intake: Mutex::new(Some(tx)),
            space: Condvar::new(),
            receiver: Mutex::new(rx),
            live: Mutex::new(0),
            exited: Condvar::new(),
            broken: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let pool = WorkerPool {
            threads: Mutex::new(WorkerThreads::default()),
            shared,
        };

        for index in 0..config.max_workers() {
            let name = format!("{}-worker-{}", config.thread_name_prefix(), index);
            let shared = Arc::clone(&pool.shared);
            let initializer = config.initializer();

            *pool.shared.live.lock() += 1;
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(&name, &shared, initializer));
            let handle = match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    *pool.shared.live.lock() -= 1;
                    return Err(e.into());
                }
            };

            let mut threads = pool.threads.lock();
            threads.ids.push(handle.thread().id());
            threads.handles.push(handle);
        }

        tracing::debug!("Worker pool started with {} threads", config.max_workers());
        Ok(pool)
    }

    /// Queue a task and return a handle to its outcome
    ///
    /// Blocks while the queue is full. A submitter waiting for queue space is
    /// released with [`PoolError::ShutDown`] as soon as shutdown begins.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ShutDown`]: shutdown has begun
    /// - [`PoolError::Broken`]: a worker initializer failed
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completion, handle) = task_channel();
        let mut job: Job = Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(value) => {
                    completion.complete(Ok(value));
                    JobStatus::Completed
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!("Task panicked: {}", message);
                    completion.complete(Err(TaskError::Panicked(message)));
                    JobStatus::Panicked
                }
            }
        });

        let mut intake = self.shared.intake.lock();
        loop {
            if self.is_broken() {
                return Err(PoolError::Broken);
            }
            let sender = intake.as_ref().ok_or(PoolError::ShutDown)?;
            match sender.try_send(job) {
                Ok(()) => return Ok(handle),
                Err(TrySendError::Full(rejected)) => {
                    job = rejected;
                    self.shared.space.wait(&mut intake);
                }
                Err(TrySendError::Disconnected(_)) => return Err(PoolError::ShutDown),
            }
        }
    }

    /// Stop accepting tasks; with `wait`, block until every worker exited
    ///
    /// Queued tasks still run. Returns `true` for the call that closed the
    /// queue. A repeated call with `wait` still blocks until the workers
    /// exited. Called from one of the pool's own workers, it joins the other
    /// workers and leaves the calling one to exit after its current task.
    pub fn shutdown(&self, wait: bool) -> bool {
        let closed = self.close();
        if wait {
            self.wait_for_workers();
        } else if closed {
            tracing::debug!("Worker pool closed, workers left to drain the queue");
        }
        closed
    }

    /// Close the queue without waiting; returns `false` if it was closed
    pub(crate) fn close(&self) -> bool {
        let sender = self.shared.intake.lock().take();
        self.shared.space.notify_all();
        sender.is_some()
    }

    fn wait_for_workers(&self) {
        let current = thread::current().id();
        let (handles, on_worker) = {
            let mut threads = self.threads.lock();
            let on_worker = threads.ids.contains(&current);
            (std::mem::take(&mut threads.handles), on_worker)
        };

        for worker in handles {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked outside of a task");
            }
        }

        if on_worker {
            tracing::warn!("Worker pool shut down from its own worker thread");
            return;
        }

        // Another caller may own the join handles
        let mut live = self.shared.live.lock();
        while *live > 0 {
            self.shared.exited.wait(&mut live);
        }
        tracing::debug!("Worker pool drained");
    }

    /// Whether shutdown has been requested
    pub fn is_shut_down(&self) -> bool {
        self.shared.intake.lock().is_none()
    }

    /// Whether a worker initializer failed
    pub fn is_broken(&self) -> bool {
        self.shared.broken.load(Ordering::Acquire)
    }

    /// Tasks currently executing
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Tasks that returned normally
    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    /// Tasks that panicked
    pub fn panicked(&self) -> u64 {
        self.shared.panicked.load(Ordering::Relaxed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

fn run_worker(name: &str, shared: &Shared, initializer: Option<Initializer>) {
    if let Some(init) = initializer {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| init())) {
            tracing::error!(
                "Initializer failed on {}: {}",
                name,
                panic_message(payload.as_ref())
            );
            shared.broken.store(true, Ordering::Release);
            shared.wake_submitters();
        }
    }

    loop {
        // Hold the lock only while waiting for the next job
        let job = shared.receiver.lock().recv();
        let Ok(job) = job else {
            break;
        };
        shared.wake_submitters();

        if shared.broken.load(Ordering::Acquire) {
            // Dropping the job resolves its handle as abandoned
            drop(job);
            continue;
        }

        shared.active.fetch_add(1, Ordering::Relaxed);
        let status = job();
        shared.active.fetch_sub(1, Ordering::Relaxed);

        match status {
            JobStatus::Completed => shared.completed.fetch_add(1, Ordering::Relaxed),
            JobStatus::Panicked => shared.panicked.fetch_add(1, Ordering::Relaxed),
        };
    }

    *shared.live.lock() -= 1;
    shared.exited.notify_all();
    tracing::debug!("{} shutting down", name);
}
