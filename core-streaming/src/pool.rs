//! # Bounded Worker Pool
//!
//! A fixed set of named threads draining one unbounded FIFO queue. Used for
//! read, write and flush, which are assumed to finish quickly.
//!
//! ## Lifecycle
//!
//! - [`WorkerPool::new`] spawns every worker up front.
//! - [`WorkerPool::submit`] never blocks; it only takes the queue lock.
//! - [`WorkerPool::shutdown`] sets the shutdown flag, wakes every worker and
//!   joins them. Workers keep dequeuing until the queue is empty, so tasks
//!   accepted before shutdown always run.
//! - Dropping the pool signals shutdown without waiting. Workers still drain
//!   the queue and exit on their own.
//!
//! The pool gives no ordering guarantee between tasks touching the same
//! handle: two tasks submitted back to back may run on different workers at
//! the same time.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use thiserror::Error;
use tracing::{debug, info, warn};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker pool needs at least one thread")]
    EmptyPool,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker pool is shut down")]
    ShutDown,
}

struct QueueState {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinState {
    Idle,
    Joining,
    Joined,
}

struct Shared {
    queue: Mutex<QueueState>,
    available: Condvar,
    executed: AtomicU64,
    join_state: Mutex<JoinState>,
    joined: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Tasks never run under the lock, so a poisoned guard still holds a
        // consistent queue.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_task(&self) -> Option<Task> {
        let mut state = self.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Fixed-size pool of background threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Mutex<Vec<ThreadId>>,
    size: usize,
}

impl WorkerPool {
    /// Spawns `size` workers named `<name_prefix>-worker-<n>`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::EmptyPool`] for a zero size and
    /// [`PoolError::Spawn`] if the OS refuses a thread. Workers spawned before
    /// the failure are shut down again.
    pub fn new(size: usize, name_prefix: &str) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::EmptyPool);
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            executed: AtomicU64::new(0),
            join_state: Mutex::new(JoinState::Idle),
            joined: Condvar::new(),
        });

        let pool = WorkerPool {
            shared,
            workers: Mutex::new(Vec::with_capacity(size)),
            worker_ids: Mutex::new(Vec::with_capacity(size)),
            size,
        };

        for index in 0..size {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", name_prefix, index))
                .spawn(move || worker_loop(shared, index));

            match spawned {
                Ok(handle) => {
                    pool.worker_ids
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(handle.thread().id());
                    pool.lock_workers().push(handle);
                }
                Err(e) => {
                    pool.shutdown();
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        info!(size, "Worker pool started");
        Ok(pool)
    }

    /// Enqueues a task and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] once shutdown has begun. The task is
    /// dropped without running.
    pub fn submit(&self, task: Task) -> Result<(), PoolError> {
        {
            let mut state = self.shared.lock();
            if state.shutdown {
                warn!("Task rejected: worker pool is shut down");
                return Err(PoolError::ShutDown);
            }
            state.tasks.push_back(task);
        }
        self.shared.available.notify_one();
        Ok(())
    }

    /// Stops accepting work, drains the queue and joins every worker.
    ///
    /// Idempotent. Concurrent callers all return once the workers are joined.
    /// When called from one of the pool's own workers that worker is not
    /// joined, and the call does not wait for another caller's join.
    pub fn shutdown(&self) {
        let claimed = {
            let mut join_state = self.lock_join_state();
            match *join_state {
                JoinState::Idle => {
                    *join_state = JoinState::Joining;
                    true
                }
                JoinState::Joining | JoinState::Joined => false,
            }
        };
        self.signal_shutdown();

        if !claimed {
            if !self.on_worker_thread() {
                let mut join_state = self.lock_join_state();
                while *join_state != JoinState::Joined {
                    join_state = self
                        .shared
                        .joined
                        .wait(join_state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            return;
        }

        let workers: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Worker thread terminated abnormally");
            }
        }

        *self.lock_join_state() = JoinState::Joined;
        self.shared.joined.notify_all();

        info!(
            executed = self.executed(),
            "Worker pool shut down"
        );
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// Number of tasks that have finished, including ones that panicked.
    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    fn signal_shutdown(&self) {
        self.shared.lock().shutdown = true;
        self.shared.available.notify_all();
    }

    fn on_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&current)
    }

    fn lock_join_state(&self) -> MutexGuard<'_, JoinState> {
        self.shared
            .join_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    debug!(worker = index, "Worker started");

    while let Some(task) = shared.next_task() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let detail = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown panic payload");
            warn!(worker = index, panic = detail, "Task panicked");
        }
        shared.executed.fetch_add(1, Ordering::AcqRel);
    }

    debug!(worker = index, "Worker exiting");
}
