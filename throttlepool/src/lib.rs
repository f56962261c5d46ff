//! # ThrottlePool
//!
//! A worker pool that bounds how many tasks may be *submitted* within a fixed
//! interval, independent of how many worker threads execute them.
//!
//! ## Overview
//!
//! Use it when a producer has to throttle itself against a downstream
//! consumer with a quota, such as an external API allowing 60 calls a minute:
//! - **Interval quota**: at most `max_per_interval` submissions per `interval`
//! - **Blocking admission**: once the quota is used up, `submit` waits for the
//!   next interval instead of failing
//! - **Bounded concurrency**: a fixed set of reusable worker threads
//! - **Result handles**: every task returns a [`TaskHandle`] that can be
//!   joined from a thread or awaited from async code
//!
//! ## Quick Start
//!
//! ```
//! use throttlepool::{PoolConfig, RateLimitedPool};
//! use std::time::Duration;
//!
//! // 2 workers, at most 10 submissions per minute
//! let config = PoolConfig::builder()
//!     .max_workers(2)
//!     .max_per_interval(10)
//!     .interval(Duration::from_secs(60))
//!     .build()?;
//!
//! let pool = RateLimitedPool::new(config)?;
//! let handle = pool.submit(|| "fetched")?;
//! assert_eq!(handle.join(), Ok("fetched"));
//! # Ok::<(), throttlepool::PoolError>(())
//! ```
//!
//! ## How It Works
//!
//! ```text
//!  submit ──▶ AdmissionGate ──▶ WorkerPool queue ──▶ worker thread ──▶ TaskHandle
//!                   ▲
//!                   │ reset every interval
//!             IntervalTimer
//! ```
//!
//! The interval timer starts with the first submission. Each time it fires it
//! resets the gate's counter, releasing submitters that were waiting. The
//! limit check and the increment happen under one lock, so the quota is a
//! hard one: no interval admits more than `max_per_interval` tasks.
//!
//! ## Scoped Usage
//!
//! Dropping a [`RateLimitedPool`] shuts it down and waits for accepted
//! tasks, so a panic or early return in the submission loop still tears the
//! pool down exactly once:
//!
//! ```
//! use throttlepool::{PoolConfig, RateLimitedPool};
//!
//! fn run(jobs: &[u32]) -> Result<u32, throttlepool::PoolError> {
//!     let pool = RateLimitedPool::new(PoolConfig::builder().max_workers(2).build()?)?;
//!     let mut handles = Vec::new();
//!     for &job in jobs {
//!         handles.push(pool.submit(move || job + 1)?);
//!     }
//!     Ok(handles.into_iter().filter_map(|h| h.join().ok()).sum())
//! } // pool shut down here
//!
//! assert_eq!(run(&[1, 2, 3])?, 9);
//! # Ok::<(), throttlepool::PoolError>(())
//! ```
//!
//! ## Features
//!
//! - `serde`: derive `Serialize` for [`PoolStats`]

pub mod core;

pub use crate::core::{
    AdmissionGate, IntervalTimer, PoolConfig, PoolConfigBuilder, PoolError, PoolState, PoolStats,
    RateLimitedPool, Result, TaskError, TaskHandle, WorkerPool,
};
