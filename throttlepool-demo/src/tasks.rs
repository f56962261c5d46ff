//! Example workload for the demo
//!
//! Each example task sleeps for a random number of seconds, standing in for
//! a call to a quota-limited API.

use anyhow::Result;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use throttlepool::{PoolError, RateLimitedPool, TaskHandle};

/// One planned example task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleTask {
    pub id: usize,
    pub sleep: Duration,
}

impl ExampleTask {
    /// Run the task on the current thread and return its id
    pub fn run(self) -> usize {
        tracing::info!("Task {} started. Sleeping time: {:?}.", self.id, self.sleep);
        thread::sleep(self.sleep);
        tracing::info!("Task {} finished.", self.id);
        self.id
    }
}

/// Plan `count` tasks sleeping between 1 and `max_sleep_secs` seconds each
pub fn generate_tasks<R: Rng>(
    count: usize,
    max_sleep_secs: u64,
    rng: &mut R,
) -> impl Iterator<Item = ExampleTask> + '_ {
    (0..count).map(move |id| ExampleTask {
        id,
        sleep: Duration::from_secs(rng.gen_range(1..=max_sleep_secs)),
    })
}

/// Submit `tasks` one by one until done, `stop` is set, or the pool shuts down
///
/// Returns the handles of every task that was accepted.
///
/// # Errors
///
/// Returns an error for submission failures other than shutdown.
pub fn submit_all<I>(
    pool: &RateLimitedPool,
    tasks: I,
    stop: &AtomicBool,
) -> Result<Vec<TaskHandle<usize>>>
where
    I: IntoIterator<Item = ExampleTask>,
{
    let mut handles = Vec::new();

    for (i, task) in tasks.into_iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            tracing::warn!("Stop requested, {} tasks planned", i);
            break;
        }

        match pool.submit(move || task.run()) {
            Ok(handle) => {
                handles.push(handle);
                tracing::info!("Planned task {}.", i);
            }
            Err(PoolError::ShutDown) => {
                tracing::warn!("Pool shut down while submitting task {}", i);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(handles)
}
