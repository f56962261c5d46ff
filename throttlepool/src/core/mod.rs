//! Core components of the throttlepool library
//!
//! This module contains the building blocks, composed bottom-up:
//! - [`gate`]: the admission gate that counts and blocks submissions
//! - [`timer`]: the repeating schedule that resets the gate every interval
//! - [`worker`]: a plain fixed-size worker pool with a bounded queue
//! - [`handle`]: the result handle returned for every submitted task
//! - [`pool`]: the rate-limited pool tying everything together

pub mod config;
pub mod gate;
pub mod handle;
pub mod pool;
pub mod stats;
pub mod timer;
pub mod worker;
#[cfg(test)]
mod tests;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use gate::AdmissionGate;
pub use handle::TaskHandle;
pub use pool::{PoolState, RateLimitedPool};
pub use stats::PoolStats;
pub use timer::IntervalTimer;
pub use worker::WorkerPool;

use thiserror::Error;

/// Errors returned synchronously by pool operations
///
/// # Variants
///
/// - [`Configuration`](PoolError::Configuration): A configuration value was rejected at build time
/// - [`ShutDown`](PoolError::ShutDown): The pool no longer accepts work
/// - [`QuotaExhausted`](PoolError::QuotaExhausted): A non-blocking submission found no quota left
/// - [`Broken`](PoolError::Broken): A worker initializer failed and the pool stopped running tasks
/// - [`Spawn`](PoolError::Spawn): The operating system refused to start a thread
///
/// # Example
///
/// ```
/// use throttlepool::{PoolConfig, PoolError};
///
/// match PoolConfig::builder().max_per_interval(0).build() {
///     Err(PoolError::Configuration(reason)) => println!("rejected: {reason}"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum PoolError {
    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Shutdown has begun; no further submissions are accepted
    #[error("pool has been shut down")]
    ShutDown,

    /// The quota for the current interval is used up
    #[error("submission quota exhausted for the current interval")]
    QuotaExhausted,

    /// A worker initializer panicked
    #[error("pool is broken: a worker initializer failed")]
    Broken,

    /// Spawning a worker or timer thread failed
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Failure outcome of a single task, delivered through its [`TaskHandle`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked; carries the panic message when it was a string
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was dropped without running (broken pool)
    #[error("task was abandoned before it ran")]
    Abandoned,
}

pub type Result<T> = std::result::Result<T, PoolError>;
