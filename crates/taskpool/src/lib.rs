//! taskpool
//!
//! Task execution core: a fixed-size worker pool with a bounded backlog and a
//! priority scheduler layered on top of it.
//!
//! # Components
//! - [`WorkerPool`]: owns the worker threads and the bounded FIFO backlog.
//!   `submit` blocks while the backlog is full, which is the only
//!   backpressure point in the crate.
//! - [`TaskScheduler`]: stages tasks in an unbounded priority heap without
//!   blocking and drains them into the pool in priority order (earliest first
//!   within a tier).
//!
//! # Features
//! - `serde`: `Serialize`/`Deserialize` for [`PoolConfig`], [`TaskPriority`],
//!   [`PendingCounts`] and [`SchedulerStats`]
//!
//! # Example
//! ```rust,no_run
//! use taskpool::{TaskPriority, TaskScheduler};
//!
//! let scheduler = TaskScheduler::new(64, 2)?;
//! scheduler.add_task(|| println!("cleanup"));
//! scheduler.add_task_with_priority(|| println!("input"), TaskPriority::High);
//!
//! scheduler.start_all_tasks();
//! scheduler.wait();
//! # Ok::<(), taskpool::PoolError>(())
//! ```

mod config;
mod error;
pub mod log;
pub mod thread;

pub use config::{PoolConfig, hardware_concurrency};
pub use error::{ConfigError, PoolError};
pub use log::{LogSink, Severity, TracingSink};
pub use thread::{PendingCounts, SchedulerStats, TaskFn, TaskPriority, TaskScheduler, WorkerPool};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
