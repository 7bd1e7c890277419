//! Pool Configuration

use crate::error::ConfigError;

/// Number of threads the host can run in parallel, never less than 1
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Worker pool configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of items waiting in the backlog
    pub max_backlog: usize,

    /// Number of worker threads, fixed for the lifetime of the pool
    pub worker_count: usize,

    /// Prefix for worker thread names (`{thread_name}-{index}`)
    pub thread_name: String,
}

impl PoolConfig {
    pub fn with_max_backlog(mut self, max_backlog: usize) -> Self {
        self.max_backlog = max_backlog;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Check the worker count against `[1, hardware_concurrency]` and the
    /// backlog capacity against `>= 1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        let available = hardware_concurrency();
        if self.worker_count > available {
            return Err(ConfigError::TooManyWorkers {
                requested: self.worker_count,
                available,
            });
        }

        if self.max_backlog == 0 {
            return Err(ConfigError::ZeroBacklog);
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_backlog: 256,
            worker_count: hardware_concurrency(),
            thread_name: "taskpool-worker".to_string(),
        }
    }
}
