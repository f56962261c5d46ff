use super::{PoolError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Configuration constants
const DEFAULT_MAX_PER_INTERVAL: usize = 10;
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_THREAD_NAME_PREFIX: &str = "throttlepool";
const MAX_DEFAULT_WORKERS: usize = 32;
const EXTRA_DEFAULT_WORKERS: usize = 4;

/// Hook run once on every worker thread before it takes its first task
pub type Initializer = Arc<dyn Fn() + Send + Sync + 'static>;

/// Immutable configuration of a [`RateLimitedPool`](super::RateLimitedPool)
///
/// Build one with [`PoolConfig::builder`]; every value is validated by
/// [`PoolConfigBuilder::build`] so a constructed config is always usable.
///
/// # Example
///
/// ```
/// use throttlepool::PoolConfig;
/// use std::time::Duration;
///
/// // 4 workers, at most 30 submissions per minute
/// let config = PoolConfig::builder()
///     .max_workers(4)
///     .max_per_interval(30)
///     .interval(Duration::from_secs(60))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_per_interval(), 30);
/// ```
#[derive(Clone)]
pub struct PoolConfig {
    max_workers: usize,
    max_per_interval: usize,
    interval: Duration,
    queue_capacity: usize,
    thread_name_prefix: String,
    initializer: Option<Initializer>,
}

/// Builder for configuring a [`PoolConfig`]
pub struct PoolConfigBuilder {
    max_workers: Option<usize>,
    max_per_interval: usize,
    interval: Duration,
    queue_capacity: usize,
    thread_name_prefix: String,
    initializer: Option<Initializer>,
}

impl PoolConfig {
    /// Create a new builder with default values
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder {
            max_workers: None,
            max_per_interval: DEFAULT_MAX_PER_INTERVAL,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            initializer: None,
        }
    }

    /// Number of worker threads
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Admissions allowed per interval
    pub fn max_per_interval(&self) -> usize {
        self.max_per_interval
    }

    /// Length of one quota window
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Capacity of the bounded task queue
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Prefix used for worker and timer thread names
    pub fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    pub(crate) fn initializer(&self) -> Option<Initializer> {
        self.initializer.clone()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_per_interval: DEFAULT_MAX_PER_INTERVAL,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            initializer: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("max_workers", &self.max_workers)
            .field("max_per_interval", &self.max_per_interval)
            .field("interval", &self.interval)
            .field("queue_capacity", &self.queue_capacity)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("initializer", &self.initializer.is_some())
            .finish()
    }
}

impl PoolConfigBuilder {
    /// Set the number of worker threads
    ///
    /// Defaults to the available parallelism plus 4, capped at 32.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Set the number of submissions admitted per interval (must be >= 1)
    pub fn max_per_interval(mut self, limit: usize) -> Self {
        self.max_per_interval = limit;
        self
    }

    /// Set the quota window length (default: 60 seconds)
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the bounded queue capacity (default: 1024)
    ///
    /// A submitter blocks when the queue is full.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the thread name prefix; workers are named `<prefix>-worker-<n>`
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Run `init` once on every worker thread before it picks up tasks
    ///
    /// If the initializer panics the pool is marked broken: queued tasks
    /// are abandoned and later submissions fail with [`PoolError::Broken`].
    pub fn initializer<F>(mut self, init: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(init));
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Configuration`] if:
    /// - `max_workers` is 0
    /// - `max_per_interval` is 0
    /// - `interval` is zero
    /// - `queue_capacity` is 0
    pub fn build(self) -> Result<PoolConfig> {
        let max_workers = self.max_workers.unwrap_or_else(default_max_workers);

        if max_workers == 0 {
            return Err(PoolError::Configuration(
                "max_workers must be at least 1".into(),
            ));
        }
        if self.max_per_interval == 0 {
            return Err(PoolError::Configuration(
                "max_per_interval must be at least 1".into(),
            ));
        }
        if self.interval.is_zero() {
            return Err(PoolError::Configuration(
                "interval must be greater than zero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::Configuration(
                "queue_capacity must be at least 1".into(),
            ));
        }

        Ok(PoolConfig {
            max_workers,
            max_per_interval: self.max_per_interval,
            interval: self.interval,
            queue_capacity: self.queue_capacity,
            thread_name_prefix: self.thread_name_prefix,
            initializer: self.initializer,
        })
    }
}

fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + EXTRA_DEFAULT_WORKERS).min(MAX_DEFAULT_WORKERS)
}
