//! # Bridge Interface
//!
//! The handle-keyed operation set the façade programs against, and
//! [`RegistryBridge`], the implementation that runs it over a
//! [`HandleRegistry`].
//!
//! Continuations passed to a [`StreamingBridge`] are invoked on whatever
//! thread finished the work (a pool worker or a download driver). Hopping
//! back to the logical thread is the façade's job.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bridge_traits::{HandleId, HandleRegistry, ReaderInfo, WriterInfo};
use bytes::Bytes;
use core_runtime::StreamingConfig;
use tracing::{debug, warn};

use crate::download::{
    completion_slot, take_completion, Completion, DownloadCoordinator, DownloadState, ProgressFn,
};
use crate::error::{ErrorCode, StreamError};
use crate::pool::WorkerPool;

/// Outcome of a successful `read_next_chunk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    Data(Bytes),
    Eof,
}

impl ReadChunk {
    pub fn is_eof(&self) -> bool {
        matches!(self, ReadChunk::Eof)
    }
}

/// Handle-keyed operations with continuation-style completion.
///
/// Every asynchronous method must invoke `done` exactly once. `close` and
/// `cancel_download` are best effort and never report failures. The info
/// getters return zeroed snapshots for unknown handles.
pub trait StreamingBridge: Send + Sync {
    fn read_next_chunk(&self, id: HandleId, done: Completion<ReadChunk>);

    fn write(&self, id: HandleId, data: Bytes, done: Completion<usize>);

    fn flush(&self, id: HandleId, done: Completion<()>);

    fn close(&self, id: HandleId);

    fn start_download(&self, id: HandleId, on_progress: ProgressFn, done: Completion<()>);

    fn cancel_download(&self, id: HandleId);

    fn reader_info(&self, id: HandleId) -> ReaderInfo;

    fn writer_info(&self, id: HandleId) -> WriterInfo;
}

/// [`StreamingBridge`] backed by a worker pool, a download coordinator and a
/// handle registry.
pub struct RegistryBridge {
    registry: Arc<dyn HandleRegistry>,
    pool: WorkerPool,
    downloads: DownloadCoordinator,
}

impl RegistryBridge {
    /// Spawns the worker pool described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`core_runtime::Error::WorkerStartup`] if the worker threads cannot
    /// be spawned.
    pub fn new(config: &StreamingConfig) -> core_runtime::Result<Self> {
        let pool = WorkerPool::new(config.worker_threads, &config.thread_name_prefix)
            .map_err(|e| core_runtime::Error::WorkerStartup(e.to_string()))?;

        let downloads = DownloadCoordinator::new(
            Arc::clone(&config.registry),
            config.progress_interval,
            config.thread_name_prefix.clone(),
        );

        Ok(Self {
            registry: Arc::clone(&config.registry),
            pool,
            downloads,
        })
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn downloads(&self) -> &DownloadCoordinator {
        &self.downloads
    }

    /// State of the latest in-flight download on `id`, if any.
    pub fn download_state(&self, id: HandleId) -> Option<DownloadState> {
        self.downloads.state_of(id)
    }

    /// Drains queued work and joins the pool. In-flight downloads are not
    /// affected.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Runs `op` against the registry on a pool worker and hands its outcome
    /// to `done`.
    fn dispatch<T, F>(&self, op: &'static str, done: Completion<T>, op_fn: F)
    where
        T: Send + 'static,
        F: FnOnce(&dyn HandleRegistry) -> Result<T, StreamError> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let slot = completion_slot(done);
        let task_slot = Arc::clone(&slot);

        let task = Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| op_fn(registry.as_ref()))) {
                Ok(result) => result,
                Err(payload) => Err(StreamError::panicked(&*payload)),
            };
            if let Err(e) = &outcome {
                debug!(op, error = %e, "Operation failed");
            }
            if let Some(done) = take_completion(&task_slot) {
                done(outcome);
            }
        });

        if let Err(e) = self.pool.submit(task) {
            warn!(op, error = %e, "Operation rejected");
            if let Some(done) = take_completion(&slot) {
                done(Err(StreamError::Native {
                    code: ErrorCode::Unknown,
                    message: format!("{} rejected: {}", op, e),
                }));
            }
        }
    }
}

impl StreamingBridge for RegistryBridge {
    fn read_next_chunk(&self, id: HandleId, done: Completion<ReadChunk>) {
        self.dispatch("readNextChunk", done, move |registry| {
            Ok(match registry.read_next_chunk(id)? {
                Some(data) => ReadChunk::Data(data),
                None => ReadChunk::Eof,
            })
        });
    }

    fn write(&self, id: HandleId, data: Bytes, done: Completion<usize>) {
        self.dispatch("write", done, move |registry| {
            Ok(registry.write(id, &data)?)
        });
    }

    fn flush(&self, id: HandleId, done: Completion<()>) {
        self.dispatch("flush", done, move |registry| Ok(registry.flush(id)?));
    }

    fn close(&self, id: HandleId) {
        let registry = &self.registry;
        match panic::catch_unwind(AssertUnwindSafe(|| registry.close(id))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(handle = %id, error = %e, "close failed"),
            Err(_) => warn!(handle = %id, "close panicked"),
        }
    }

    fn start_download(&self, id: HandleId, on_progress: ProgressFn, done: Completion<()>) {
        self.downloads.start(id, on_progress, done);
    }

    fn cancel_download(&self, id: HandleId) {
        self.downloads.cancel(id);
    }

    fn reader_info(&self, id: HandleId) -> ReaderInfo {
        let registry = &self.registry;
        panic::catch_unwind(AssertUnwindSafe(|| ReaderInfo {
            file_size: registry.reader_file_size(id).unwrap_or_default(),
            bytes_read: registry.reader_bytes_read(id).unwrap_or_default(),
            is_eof: registry.reader_is_eof(id).unwrap_or_default(),
        }))
        .unwrap_or_default()
    }

    fn writer_info(&self, id: HandleId) -> WriterInfo {
        let registry = &self.registry;
        panic::catch_unwind(AssertUnwindSafe(|| WriterInfo {
            bytes_written: registry.writer_bytes_written(id).unwrap_or_default(),
        }))
        .unwrap_or_default()
    }
}
