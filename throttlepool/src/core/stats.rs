//! Point-in-time counters for a running pool

/// Snapshot returned by [`RateLimitedPool::stats`](super::RateLimitedPool::stats)
///
/// All counters are cumulative since the pool was created, except `active`
/// and `admitted_this_interval` which describe the current moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStats {
    /// Tasks accepted into the queue
    pub submitted: u64,
    /// Submissions that had to wait for a new interval
    pub throttled: u64,
    /// Interval resets performed by the timer
    pub resets: u64,
    /// Tasks that returned normally
    pub completed: u64,
    /// Tasks that panicked
    pub panicked: u64,
    /// Tasks executing right now
    pub active: usize,
    /// Admissions counted in the current interval
    pub admitted_this_interval: usize,
}

impl PoolStats {
    /// Tasks accepted but not yet finished
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.panicked)
    }
}
