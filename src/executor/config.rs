//! Configuration for a parallel loop.
//!
//! Example:
//! ```ignore
//! let config = LoopConfig::builder()
//!     .worker_count(4)
//!     .iteration_timeout(Duration::from_secs(30))
//!     .build();
//! let looper = ParallelLoop::new(config)?;
//! ```
//!
//! # Sizing notes
//! - `worker_count`: more workers help when the body is slow per item;
//!   memory grows with one scope clone per worker.
//! - `channel_capacity`: bounds how far task distribution can run ahead of
//!   consumption, so queued work never grows unboundedly.

use std::time::Duration;

use crate::error::{Error, Result};

/// Parameters controlling one parallel region.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Number of workers. Must be at least 2; a parallel region with fewer
    /// workers is a rejected configuration, not a silently-clamped one.
    /// Defaults to the number of logical CPUs.
    pub worker_count: usize,
    /// Bound on the whole distribute-then-collect phase. `None` means no
    /// bound. There is no per-task or per-result timeout; see
    /// `ParallelLoop::run`.
    pub iteration_timeout: Option<Duration>,
    /// Capacity of the bounded task channel (must be > 0).
    pub channel_capacity: usize,
    /// How often a waiting worker checks for forceful shutdown. A polling
    /// interval, not an error timeout.
    pub poll_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(2),
            iteration_timeout: None,
            channel_capacity: 64,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl LoopConfig {
    pub fn builder() -> LoopConfigBuilder {
        LoopConfigBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.worker_count < 2 {
            return Err(Error::Config(format!(
                "worker_count must be at least 2, got {}",
                self.worker_count
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config(
                "channel_capacity must be > 0 to prevent deadlocks".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`LoopConfig`] with method chaining.
#[derive(Debug, Default)]
pub struct LoopConfigBuilder {
    config: LoopConfig,
}

impl LoopConfigBuilder {
    /// Set the number of workers (minimum 2, checked when the loop is
    /// constructed).
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Bound the whole parallel region. When exceeded, the pool is torn
    /// down forcefully and the region fails without merging.
    pub fn iteration_timeout(mut self, timeout: Duration) -> Self {
        self.config.iteration_timeout = Some(timeout);
        self
    }

    /// Set the task channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the shutdown polling interval for idle workers.
    ///
    /// - Too low: more responsive teardown, more wakeups.
    /// - Too high: slower reaction to a forceful shutdown.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn build(self) -> LoopConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LoopConfig::default().validate().is_ok());
    }

    #[test]
    fn fewer_than_two_workers_is_rejected_not_clamped() {
        for count in [0, 1] {
            let config = LoopConfig::builder().worker_count(count).build();
            assert!(matches!(config.validate(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn zero_capacity_channel_is_rejected() {
        let config = LoopConfig::builder().channel_capacity(0).build();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
