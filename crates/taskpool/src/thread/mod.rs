//! Threading Model
//!
//! Bounded worker pool and the priority scheduler that feeds it.
//! - `pool`: worker threads, bounded FIFO backlog, lifecycle
//! - `scheduler`: unbounded priority staging drained into the pool

mod pool;
mod scheduler;

pub use pool::*;
pub use scheduler::*;
