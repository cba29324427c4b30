//! # Download Coordinator
//!
//! Runs downloads outside the worker pool, since a download may block for
//! minutes and would otherwise starve short reads and writes.
//!
//! ## Threads
//!
//! Each download gets a dedicated driver thread that performs the registry's
//! blocking call end to end. While it runs, a poller thread samples the
//! registry counters every `progress_interval`. When the blocking call
//! returns, the driver marks the task complete, wakes the poller and joins it
//! before reporting anything. Progress therefore never follows the settlement.
//!
//! ## State Machine
//!
//! ```text
//! Running ──→ CancelRequested ──→ Succeeded | Failed
//!    └──────────────────────────→ Succeeded | Failed
//! ```
//!
//! Terminal states are final. Cancellation is cooperative: `cancel` only
//! records the request and asks the registry to interrupt the blocking call.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bridge_traits::{DownloadCounters, HandleId, HandleRegistry};
use tracing::{debug, info, trace, warn};

use crate::error::{ErrorCode, StreamError};

/// Receives progress samples on the thread that produced them.
pub type ProgressFn = Arc<dyn Fn(DownloadProgress) + Send + Sync + 'static>;

/// Receives the single terminal outcome of an operation.
pub type Completion<T> = Box<dyn FnOnce(Result<T, StreamError>) + Send + 'static>;

/// One progress sample.
///
/// With a known total `progress` is `bytes_downloaded / total_bytes` clamped to
/// `[0, 1]`. With an unknown total the sample is the indeterminate sentinel:
/// `total_bytes` and `progress` are both `-1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    pub total_bytes: i64,
    pub progress: f64,
}

impl DownloadProgress {
    /// Applies the sampling policy to raw counters.
    ///
    /// Returns `None` when nothing has been downloaded and the total is not
    /// known yet.
    pub fn from_counters(counters: DownloadCounters) -> Option<Self> {
        if counters.has_known_total() {
            let ratio = counters.bytes_downloaded as f64 / counters.total_bytes as f64;
            Some(Self {
                bytes_downloaded: counters.bytes_downloaded,
                total_bytes: counters.total_bytes,
                progress: ratio.clamp(0.0, 1.0),
            })
        } else if counters.bytes_downloaded > 0 {
            Some(Self::indeterminate(counters.bytes_downloaded))
        } else {
            None
        }
    }

    pub fn indeterminate(bytes_downloaded: u64) -> Self {
        Self {
            bytes_downloaded,
            total_bytes: -1,
            progress: -1.0,
        }
    }

    /// Terminal sample reported after a successful download with a known total.
    pub fn complete(counters: DownloadCounters) -> Option<Self> {
        counters.has_known_total().then_some(Self {
            bytes_downloaded: counters.bytes_downloaded,
            total_bytes: counters.total_bytes,
            progress: 1.0,
        })
    }

    pub fn is_indeterminate(&self) -> bool {
        self.total_bytes < 0
    }
}

/// Lifecycle of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadState {
    Running,
    CancelRequested,
    Succeeded,
    Failed,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Succeeded | DownloadState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Running => "running",
            DownloadState::CancelRequested => "cancel_requested",
            DownloadState::Succeeded => "succeeded",
            DownloadState::Failed => "failed",
        }
    }

    fn can_transition_to(&self, next: DownloadState) -> bool {
        use DownloadState::*;
        matches!(
            (self, next),
            (Running, CancelRequested)
                | (Running, Succeeded)
                | (Running, Failed)
                | (CancelRequested, Succeeded)
                | (CancelRequested, Failed)
        )
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping shared by a download's driver and poller.
#[derive(Debug)]
pub struct DownloadTask {
    handle: HandleId,
    state: Mutex<DownloadState>,
    completed: AtomicBool,
}

impl DownloadTask {
    fn new(handle: HandleId) -> Self {
        Self {
            handle,
            state: Mutex::new(DownloadState::Running),
            completed: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn state(&self) -> DownloadState {
        *self.lock_state()
    }

    /// Completion flag; stops the poller.
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Applies `next` if the transition is legal. Returns whether it was applied.
    fn transition(&self, next: DownloadState) -> bool {
        let mut state = self.lock_state();
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    fn mark_complete(&self) {
        self.completed.store(true, Ordering::Release);
    }

    fn lock_state(&self) -> MutexGuard<'_, DownloadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type ActiveTable = Arc<Mutex<HashMap<u64, Arc<DownloadTask>>>>;

/// Spawns and tracks download driver/poller thread pairs.
pub struct DownloadCoordinator {
    registry: Arc<dyn HandleRegistry>,
    progress_interval: Duration,
    thread_name_prefix: String,
    active: ActiveTable,
    next_seq: AtomicU64,
}

impl DownloadCoordinator {
    pub fn new(
        registry: Arc<dyn HandleRegistry>,
        progress_interval: Duration,
        thread_name_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            progress_interval,
            thread_name_prefix: thread_name_prefix.into(),
            active: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Starts a download on a fresh driver thread and returns immediately.
    ///
    /// `on_progress` is called from the poller thread (and once from the driver
    /// for the terminal sample); `done` is called exactly once from the driver.
    /// If the driver thread cannot be spawned `done` receives the error on the
    /// calling thread.
    pub fn start(&self, handle: HandleId, on_progress: ProgressFn, done: Completion<()>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(DownloadTask::new(handle));
        lock_active(&self.active).insert(seq, Arc::clone(&task));

        let done = completion_slot(done);

        let driver = Driver {
            seq,
            task,
            registry: Arc::clone(&self.registry),
            active: Arc::clone(&self.active),
            on_progress,
            done: Arc::clone(&done),
            progress_interval: self.progress_interval,
            poller_name: format!("{}-poll-{}", self.thread_name_prefix, handle),
        };

        let spawned = thread::Builder::new()
            .name(format!("{}-download-{}", self.thread_name_prefix, handle))
            .spawn(move || driver.run());

        match spawned {
            Ok(_) => debug!(handle = %handle, seq, "Download started"),
            Err(e) => {
                warn!(handle = %handle, error = %e, "Failed to spawn download driver");
                lock_active(&self.active).remove(&seq);
                if let Some(done) = take_completion(&done) {
                    done(Err(StreamError::Native {
                        code: ErrorCode::DownloadFailed,
                        message: format!("failed to spawn download thread: {}", e),
                    }));
                }
            }
        }
    }

    /// Requests cancellation of every in-flight download on `handle`.
    ///
    /// Best effort: registry failures are logged and swallowed. Safe to call
    /// before the download starts or after it finished.
    pub fn cancel(&self, handle: HandleId) {
        for task in self.tasks_for(handle) {
            if task.transition(DownloadState::CancelRequested) {
                debug!(handle = %handle, "Download cancellation requested");
            }
        }

        let registry = &self.registry;
        match panic::catch_unwind(AssertUnwindSafe(|| registry.cancel_download(handle))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(handle = %handle, error = %e, "cancelDownload failed"),
            Err(_) => warn!(handle = %handle, "cancelDownload panicked"),
        }
    }

    /// Number of downloads whose driver has not finished yet.
    pub fn active_downloads(&self) -> usize {
        lock_active(&self.active).len()
    }

    /// State of the most recent in-flight download on `handle`.
    pub fn state_of(&self, handle: HandleId) -> Option<DownloadState> {
        lock_active(&self.active)
            .iter()
            .filter(|(_, task)| task.handle == handle)
            .max_by_key(|(seq, _)| **seq)
            .map(|(_, task)| task.state())
    }

    fn tasks_for(&self, handle: HandleId) -> Vec<Arc<DownloadTask>> {
        lock_active(&self.active)
            .values()
            .filter(|task| task.handle == handle)
            .cloned()
            .collect()
    }
}

fn lock_active(active: &ActiveTable) -> MutexGuard<'_, HashMap<u64, Arc<DownloadTask>>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared holder that lets a completion survive a task that never ran.
pub(crate) type CompletionSlot<T> = Arc<Mutex<Option<Completion<T>>>>;

pub(crate) fn completion_slot<T>(done: Completion<T>) -> CompletionSlot<T> {
    Arc::new(Mutex::new(Some(done)))
}

pub(crate) fn take_completion<T>(slot: &Mutex<Option<Completion<T>>>) -> Option<Completion<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Runs a registry call, turning failures and panics into a [`StreamError`].
fn guarded<T>(call: impl FnOnce() -> bridge_traits::error::Result<T>) -> Result<T, StreamError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(StreamError::from),
        Err(payload) => Err(StreamError::panicked(&*payload)),
    }
}

struct Driver {
    seq: u64,
    task: Arc<DownloadTask>,
    registry: Arc<dyn HandleRegistry>,
    active: ActiveTable,
    on_progress: ProgressFn,
    done: CompletionSlot<()>,
    progress_interval: Duration,
    poller_name: String,
}

impl Driver {
    /// Thread body. Whatever happens inside [`drive`](Self::drive), the task
    /// leaves the active table and `done` runs exactly once.
    fn run(self) {
        let handle = self.task.handle();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.drive())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                self.task.mark_complete();
                Err(StreamError::panicked(&*payload))
            }
        };

        let outcome = match outcome {
            Ok(()) => {
                self.task.transition(DownloadState::Succeeded);
                info!(handle = %handle, "Download succeeded");
                Ok(())
            }
            Err(e) => {
                let cancelled = self.task.state() == DownloadState::CancelRequested;
                self.task.transition(DownloadState::Failed);
                info!(handle = %handle, cancelled, error = %e, "Download failed");
                Err(e)
            }
        };

        lock_active(&self.active).remove(&self.seq);

        if let Some(done) = take_completion(&self.done) {
            done(outcome);
        }
    }

    /// Runs the blocking download with its poller. The poller is joined
    /// before the terminal sample is reported.
    fn drive(&self) -> Result<(), StreamError> {
        let handle = self.task.handle();
        let reports_progress = self.registry.capabilities().download_progress;

        let poller = if reports_progress {
            self.spawn_poller()
        } else {
            debug!(handle = %handle, "Registry does not report download progress");
            None
        };

        let outcome = guarded(|| self.registry.start_download(handle));

        self.task.mark_complete();
        if let Some(poller) = poller {
            poller.thread().unpark();
            if poller.join().is_err() {
                warn!(handle = %handle, "Progress poller terminated abnormally");
            }
        }

        if outcome.is_ok() && reports_progress {
            self.report_final_progress();
        }
        outcome
    }

    fn spawn_poller(&self) -> Option<JoinHandle<()>> {
        let poller = Poller {
            task: Arc::clone(&self.task),
            registry: Arc::clone(&self.registry),
            on_progress: Arc::clone(&self.on_progress),
            interval: self.progress_interval,
        };

        match thread::Builder::new()
            .name(self.poller_name.clone())
            .spawn(move || poller.run())
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(handle = %self.task.handle(), error = %e, "Failed to spawn progress poller");
                None
            }
        }
    }

    fn report_final_progress(&self) {
        let handle = self.task.handle();
        match guarded(|| self.registry.download_counters(handle)) {
            Ok(counters) => {
                if let Some(sample) = DownloadProgress::complete(counters) {
                    (self.on_progress)(sample);
                }
            }
            Err(e) => debug!(handle = %handle, error = %e, "Final counters unavailable"),
        }
    }
}

struct Poller {
    task: Arc<DownloadTask>,
    registry: Arc<dyn HandleRegistry>,
    on_progress: ProgressFn,
    interval: Duration,
}

impl Poller {
    fn run(self) {
        let handle = self.task.handle();

        while !self.task.is_complete() {
            thread::park_timeout(self.interval);
            if self.task.is_complete() {
                break;
            }

            match guarded(|| self.registry.download_counters(handle)) {
                Ok(counters) => {
                    if let Some(sample) = DownloadProgress::from_counters(counters) {
                        (self.on_progress)(sample);
                    }
                }
                Err(e) => trace!(handle = %handle, error = %e, "Progress poll failed"),
            }
        }
    }
}
