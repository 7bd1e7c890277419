//! Scheduler demo
//!
//! Stages a mix of priorities, drains them through a small pool and restarts
//! the pool once. Run with `RUST_LOG=taskpool=debug` to see lifecycle events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use taskpool::{PoolConfig, TaskPriority, TaskScheduler, hardware_concurrency};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("taskpool=info".parse()?))
        .init();

    let config = PoolConfig::default()
        .with_worker_count(hardware_concurrency().min(2))
        .with_max_backlog(4)
        .with_thread_name("demo-worker");
    let scheduler = TaskScheduler::from_config(config)?;
    let completed = Arc::new(AtomicUsize::new(0));

    for i in 0..12 {
        let priority = match i % 3 {
            0 => TaskPriority::Low,
            1 => TaskPriority::Medium,
            _ => TaskPriority::High,
        };
        let completed = Arc::clone(&completed);
        let id = scheduler.add_task_with_priority(
            move || {
                thread::sleep(Duration::from_millis(10));
                completed.fetch_add(1, Ordering::SeqCst);
                tracing::info!(task = i, priority = priority.name(), "task finished");
            },
            priority,
        );
        tracing::debug!(sequence_id = id, "staged");
    }

    scheduler.add_task(|| {
        panic!("demo failure");
    });

    tracing::info!(pending = ?scheduler.pending_counts(), "draining");
    let admitted = scheduler.start_all_tasks();
    scheduler.wait();
    tracing::info!(admitted, completed = completed.load(Ordering::SeqCst), "drained");

    scheduler.pool().restart()?;
    scheduler.add_task(|| tracing::info!("running after restart"));
    scheduler.start_all_tasks();
    scheduler.wait();

    tracing::info!(stats = ?scheduler.stats(), "done");
    scheduler.pool().shutdown();

    Ok(())
}
