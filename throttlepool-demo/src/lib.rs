//! # ThrottlePool Demo
//!
//! Command-line driver for the [`throttlepool`] library. It plans a batch of
//! example tasks that each sleep a random number of seconds and submits them
//! to a [`throttlepool::RateLimitedPool`], so the effect of the interval
//! quota can be watched in the log output.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! throttlepool --help
//!
//! # 2 workers, at most 10 tasks per minute, 100 tasks
//! throttlepool -n 2 -x 10 -t 100
//!
//! # Short interval and short tasks to see several quota windows quickly
//! throttlepool -x 3 --interval-secs 5 -t 12 --max-task-secs 2
//! ```
//!
//! Pressing Ctrl-C stops submitting; tasks already dispatched finish before
//! the process exits.

pub mod config;
pub mod tasks;
