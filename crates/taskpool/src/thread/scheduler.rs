//! Task Scheduler
//!
//! Priority staging in front of a [`WorkerPool`]. `add_task` never blocks;
//! draining into the pool goes through `WorkerPool::submit`, so the pool's
//! bounded backlog throttles admission.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::pool::{TaskFn, WorkerPool};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::log::{LogSink, Severity, TracingSink};

/// Task priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TaskPriority {
    /// Background work
    #[default]
    Low = 0,
    Medium = 1,
    /// Drained before anything else
    High = 2,
}

impl TaskPriority {
    /// Get priority name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Staged task
pub(crate) struct Task {
    /// Insertion order, starting at 1
    sequence_id: u64,
    priority: TaskPriority,
    work: TaskFn,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("sequence_id", &self.sequence_id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

// `BinaryHeap` pops the greatest element: a higher tier is greater, and
// within a tier the smaller sequence id is greater.
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence_id.cmp(&self.sequence_id))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

/// Staged task counts by priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerStats {
    /// Tasks ever staged
    pub total_scheduled: u64,
    /// Tasks admitted to the pool
    pub total_submitted: u64,
    pub pending: PendingCounts,
}

/// Staging area, guarded by its own lock
#[derive(Default)]
struct Staging {
    heap: BinaryHeap<Task>,
    next_sequence: u64,
    total_scheduled: u64,
    total_submitted: u64,
}

impl Staging {
    fn push(&mut self, priority: TaskPriority, work: TaskFn) -> u64 {
        self.next_sequence += 1;
        self.total_scheduled += 1;

        let sequence_id = self.next_sequence;
        self.heap.push(Task {
            sequence_id,
            priority,
            work,
        });

        sequence_id
    }

    fn pending_counts(&self) -> PendingCounts {
        let mut counts = PendingCounts::default();
        for task in &self.heap {
            match task.priority {
                TaskPriority::High => counts.high += 1,
                TaskPriority::Medium => counts.medium += 1,
                TaskPriority::Low => counts.low += 1,
            }
        }
        counts
    }
}

/// Priority scheduler feeding a [`WorkerPool`]
///
/// The staging lock and the pool lock are never held together: a task is
/// popped under the staging lock, which is released before the blocking
/// submit.
pub struct TaskScheduler {
    pool: WorkerPool,
    staging: Mutex<Staging>,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("pool", &self.pool)
            .field("staged", &self.tasks_count())
            .finish()
    }
}

impl TaskScheduler {
    /// Create a scheduler over a pool built from the same parameters
    pub fn new(max_backlog: usize, worker_count: usize) -> Result<Self, PoolError> {
        Self::from_config(
            PoolConfig::default()
                .with_max_backlog(max_backlog)
                .with_worker_count(worker_count),
        )
    }

    pub fn from_config(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: PoolConfig, sink: Arc<dyn LogSink>) -> Result<Self, PoolError> {
        Ok(Self {
            pool: WorkerPool::with_sink(config, sink)?,
            staging: Mutex::new(Staging::default()),
        })
    }

    /// Stage a task at [`TaskPriority::Low`]
    ///
    /// Returns the task's sequence id.
    pub fn add_task<F>(&self, work: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_task_with_priority(work, TaskPriority::Low)
    }

    /// Stage a task; never blocks
    ///
    /// Returns the task's sequence id.
    pub fn add_task_with_priority<F>(&self, work: F, priority: TaskPriority) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock_staging().push(priority, Box::new(work))
    }

    /// Drain every staged task into the pool, highest priority first
    ///
    /// Blocks whenever the pool backlog is full. If the pool is stopped,
    /// the rejected task goes back to staging and draining stops.
    /// Returns the number of tasks admitted.
    pub fn start_all_tasks(&self) -> usize {
        let mut submitted = 0;

        while let Some(task) = self.pop_next() {
            if !self.admit(task) {
                self.pool.log(
                    &format!(
                        "Draining stopped: worker pool is stopped, {} tasks remain staged",
                        self.tasks_count()
                    ),
                    Severity::Warning,
                );
                break;
            }
            submitted += 1;
        }

        submitted
    }

    /// Submit the single highest priority task
    ///
    /// Returns `false` if nothing was staged or the pool rejected the task.
    pub fn start(&self) -> bool {
        match self.pop_next() {
            Some(task) => self.admit(task),
            None => false,
        }
    }

    /// Drop everything still queued in the pool backlog and block until
    /// in-flight tasks finish. Staged tasks are kept.
    pub fn stop_all_tasks(&self) {
        self.pool.wait(true);
    }

    /// Block until every admitted task has run
    pub fn wait(&self) {
        self.pool.wait(false);
    }

    /// Tasks staged but not yet admitted to the pool
    pub fn tasks_count(&self) -> usize {
        self.lock_staging().heap.len()
    }

    /// Tasks currently executing
    pub fn running_tasks(&self) -> usize {
        self.pool.running_count()
    }

    /// Get staged counts at each priority
    pub fn pending_counts(&self) -> PendingCounts {
        self.lock_staging().pending_counts()
    }

    /// Get scheduler stats
    pub fn stats(&self) -> SchedulerStats {
        let staging = self.lock_staging();
        SchedulerStats {
            total_scheduled: staging.total_scheduled,
            total_submitted: staging.total_submitted,
            pending: staging.pending_counts(),
        }
    }

    /// Discard all staged tasks, returning how many were dropped
    pub fn clear(&self) -> usize {
        let discarded = mem::take(&mut self.lock_staging().heap);
        discarded.len()
    }

    /// Underlying pool, for lifecycle control and observability
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn lock_staging(&self) -> MutexGuard<'_, Staging> {
        self.staging.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_next(&self) -> Option<Task> {
        self.lock_staging().heap.pop()
    }

    /// Submit a popped task, re-staging it under its original sequence id
    /// if the pool refuses it.
    fn admit(&self, task: Task) -> bool {
        let Task {
            sequence_id,
            priority,
            work,
        } = task;

        match self.pool.push(work) {
            Ok(()) => {
                self.lock_staging().total_submitted += 1;
                true
            }
            Err(work) => {
                self.lock_staging().heap.push(Task {
                    sequence_id,
                    priority,
                    work,
                });
                false
            }
        }
    }
}
