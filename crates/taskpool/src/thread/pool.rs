//! Worker Pool
//!
//! Fixed set of worker threads draining a bounded FIFO backlog.
//!
//! All backlog access and the `running`/`running_count` fields sit behind one
//! mutex. Two condition variables hang off it:
//! - `not_empty`: workers park here until an item arrives or the pool stops
//! - `not_full`: producers blocked on a full backlog and `wait` callers park
//!   here; it is signalled whenever an item leaves the backlog, a task
//!   finishes, or the pool stops

use std::any::Any;
use std::collections::VecDeque;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::log::{LogSink, Severity, TracingSink};

/// Task function type
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// Fields guarded by the pool lock
struct State {
    /// Pending items, oldest first
    backlog: VecDeque<TaskFn>,
    /// Lifecycle flag; once false nothing new is admitted
    running: bool,
    /// Workers currently executing an item
    running_count: usize,
    /// Bumped on every restart; workers from an older generation exit
    generation: u64,
}

/// State shared between the pool handle and its workers
struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    max_backlog: usize,
    sink: Arc<dyn LogSink>,
}

impl Shared {
    // User code never runs under this lock, so a poisoned guard still holds
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-size worker pool with a bounded backlog
///
/// Every operation takes `&self`; share the pool between producers with an
/// `Arc`. Dropping the pool shuts it down.
pub struct WorkerPool {
    shared: Arc<Shared>,
    /// Join handles of the live workers. Always locked before the state lock.
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PoolConfig,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.config.worker_count)
            .field("max_backlog", &self.shared.max_backlog)
            .field("running", &state.running)
            .field("backlog_len", &state.backlog.len())
            .field("running_count", &state.running_count)
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool with `worker_count` threads and room for `max_backlog`
    /// pending items.
    ///
    /// `worker_count` must be in `[1, hardware_concurrency]` and
    /// `max_backlog` at least 1.
    pub fn new(max_backlog: usize, worker_count: usize) -> Result<Self, PoolError> {
        Self::from_config(
            PoolConfig::default()
                .with_max_backlog(max_backlog)
                .with_worker_count(worker_count),
        )
    }

    /// Create a pool that logs through `tracing`
    pub fn from_config(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a pool that reports to a custom log sink
    pub fn with_sink(config: PoolConfig, sink: Arc<dyn LogSink>) -> Result<Self, PoolError> {
        if let Err(err) = config.validate() {
            sink.log(
                &format!("Rejected worker pool configuration: {}", err),
                Severity::Error,
            );
            return Err(err.into());
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                backlog: VecDeque::new(),
                running: true,
                running_count: 0,
                generation: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            max_backlog: config.max_backlog,
            sink,
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(config.worker_count)),
            config,
        };

        // On failure the pool is dropped here, which stops and joins
        // whatever was already spawned.
        pool.spawn_workers(&mut pool.lock_workers())?;

        pool.log(
            &format!(
                "Worker pool started: {} workers, backlog capacity {}",
                pool.config.worker_count, pool.config.max_backlog
            ),
            Severity::Info,
        );

        Ok(pool)
    }

    /// Submit a task
    ///
    /// Blocks while the backlog is full. Returns `false` if the pool is
    /// stopped (or stops while waiting for space); the task is dropped.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Box::new(task)).is_ok()
    }

    /// Push a boxed task, handing it back if the pool is stopped.
    pub(crate) fn push(&self, task: TaskFn) -> Result<(), TaskFn> {
        let max_backlog = self.shared.max_backlog;
        let state = self.shared.lock();
        let mut state = self
            .shared
            .not_full
            .wait_while(state, |s| s.running && s.backlog.len() >= max_backlog)
            .unwrap_or_else(PoisonError::into_inner);

        if !state.running {
            drop(state);
            self.log("Submission rejected: worker pool is stopped", Severity::Warning);
            return Err(task);
        }

        state.backlog.push_back(task);
        drop(state);
        self.shared.not_empty.notify_one();

        Ok(())
    }

    /// Block until the pool is quiescent (backlog empty, nothing executing)
    /// or stopped.
    ///
    /// With `clear_backlog`, every queued item that no worker has picked up
    /// yet is discarded first. Items already executing always run to
    /// completion.
    pub fn wait(&self, clear_backlog: bool) {
        if clear_backlog {
            let discarded = mem::take(&mut self.shared.lock().backlog);
            self.shared.not_full.notify_all();

            if !discarded.is_empty() {
                self.log(
                    &format!("Discarded {} queued tasks", discarded.len()),
                    Severity::Debug,
                );
            }
        }

        let state = self.shared.lock();
        let _state = self
            .shared
            .not_full
            .wait_while(state, |s| {
                s.running && !(s.backlog.is_empty() && s.running_count == 0)
            })
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Stop the pool
    ///
    /// Queued items are dropped without running; in-flight items finish,
    /// and every worker thread is joined before this returns. Calling it
    /// on a stopped pool returns immediately.
    ///
    /// When called from inside a task, the calling worker is detached
    /// rather than joined and exits after the task returns.
    pub fn shutdown(&self) {
        let mut workers = self.lock_workers();

        if let Some(dropped) = self.stop_and_join(&mut workers) {
            self.log(
                &format!("Worker pool stopped ({} queued tasks dropped)", dropped),
                Severity::Info,
            );
        }
    }

    /// Stop the pool if it is running, then spawn a fresh set of
    /// `worker_count` threads.
    ///
    /// This is the only way back to a running state: a stopped pool has no
    /// threads left to resume.
    pub fn restart(&self) -> Result<(), PoolError> {
        self.shutdown();

        let mut workers = self.lock_workers();

        // Lost the race against a concurrent restart.
        if self.is_running() {
            return Ok(());
        }

        {
            let mut state = self.shared.lock();
            state.running = true;
            state.generation += 1;
        }
        self.shared.not_empty.notify_all();

        if let Err(err) = self.spawn_workers(&mut workers) {
            self.stop_and_join(&mut workers);
            self.log(
                &format!("Worker pool restart failed: {}", err),
                Severity::Error,
            );
            return Err(err);
        }

        self.log(
            &format!(
                "Worker pool restarted with {} workers",
                self.config.worker_count
            ),
            Severity::Info,
        );

        Ok(())
    }

    /// Whether the pool accepts submissions
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Configured worker count
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Items waiting in the backlog
    pub fn backlog_len(&self) -> usize {
        self.shared.lock().backlog.len()
    }

    /// Backlog capacity
    pub fn max_backlog(&self) -> usize {
        self.shared.max_backlog
    }

    /// Items currently executing
    pub fn running_count(&self) -> usize {
        self.shared.lock().running_count
    }

    /// Check if pool is idle
    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        state.backlog.is_empty() && state.running_count == 0
    }

    /// Get pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn log(&self, message: &str, severity: Severity) {
        self.shared.sink.log(message, severity);
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_workers(&self, workers: &mut Vec<JoinHandle<()>>) -> Result<(), PoolError> {
        let generation = self.shared.lock().generation;

        for index in 0..self.config.worker_count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", self.config.thread_name, index))
                .spawn(move || run_worker(&shared, generation))?;
            workers.push(handle);
        }

        Ok(())
    }

    /// Flip `running` off, drop the backlog and join every worker.
    ///
    /// Returns the number of dropped items, or `None` if the pool was
    /// already stopped.
    fn stop_and_join(&self, workers: &mut Vec<JoinHandle<()>>) -> Option<usize> {
        let discarded = {
            let mut state = self.shared.lock();
            if !state.running {
                return None;
            }
            state.running = false;
            mem::take(&mut state.backlog)
        };

        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();

        let dropped = discarded.len();
        drop(discarded);

        // Called from a task: that worker exits by itself once its task
        // returns, and joining it here would deadlock.
        let current = thread::current().id();
        for handle in workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                self.log("Worker thread terminated abnormally", Severity::Error);
            }
        }

        Some(dropped)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker loop: pop, execute, repeat until stopped with an empty backlog.
///
/// A worker detached by a shutdown issued from its own task may still be
/// finishing when the pool restarts; the generation check retires it.
fn run_worker(shared: &Shared, generation: u64) {
    loop {
        let task = {
            let state = shared.lock();
            let mut state = shared
                .not_empty
                .wait_while(state, |s| {
                    s.running && s.generation == generation && s.backlog.is_empty()
                })
                .unwrap_or_else(PoisonError::into_inner);

            if state.generation != generation {
                return;
            }

            match state.backlog.pop_front() {
                Some(task) => {
                    state.running_count += 1;
                    task
                }
                None => return,
            }
        };

        // Space opened up for a blocked producer.
        shared.not_full.notify_all();

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            shared.sink.log(
                &format!("Task panicked: {}", panic_message(&*payload)),
                Severity::Error,
            );
        }

        shared.lock().running_count -= 1;
        shared.not_full.notify_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
