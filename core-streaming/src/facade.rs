//! # Streaming Façade
//!
//! The object the script environment calls. Every asynchronous entry returns a
//! [`PendingOperation`] immediately; the blocking work happens on pool or
//! download threads and the outcome comes back through the
//! [`CallbackBridge`] on the logical thread.
//!
//! ## Teardown
//!
//! [`StreamingFacade::teardown`] (or dropping the façade) revokes the liveness
//! flag. Continuations still in flight are discarded when they reach the
//! logical thread: no progress callback fires and pending operations resolve to
//! [`StreamError::Detached`](crate::StreamError::Detached).
//!
//! ## Ordering
//!
//! Operations on the same handle are not serialized. A caller that issues a
//! `write` and a `flush` on one handle without awaiting the first may see them
//! run in either order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::{CallInvoker, HandleId, ReaderInfo, WriterInfo};
use bytes::Bytes;
use core_runtime::StreamingConfig;
use tracing::debug;

use crate::bridge::{ReadChunk, RegistryBridge, StreamingBridge};
use crate::callback::{CallbackBridge, Liveness};
use crate::download::{Completion, DownloadProgress, ProgressFn};
use crate::pending::PendingOperation;

/// Operation surface exposed to the logical thread.
pub struct StreamingFacade {
    bridge: Arc<dyn StreamingBridge>,
    callbacks: CallbackBridge,
    liveness: Liveness,
    global_name: String,
}

impl StreamingFacade {
    /// Builds a façade over a [`RegistryBridge`] configured from `config`.
    pub fn new(config: &StreamingConfig) -> core_runtime::Result<Self> {
        let bridge = RegistryBridge::new(config)?;
        Ok(Self::with_bridge(
            Arc::new(bridge),
            Arc::clone(&config.invoker),
            config.global_name.clone(),
        ))
    }

    /// Builds a façade over any bridge implementation.
    pub fn with_bridge(
        bridge: Arc<dyn StreamingBridge>,
        invoker: Arc<dyn CallInvoker>,
        global_name: impl Into<String>,
    ) -> Self {
        let liveness = Liveness::new();
        let callbacks = CallbackBridge::new(invoker, liveness.token());
        Self {
            bridge,
            callbacks,
            liveness,
            global_name: global_name.into(),
        }
    }

    /// Name this façade installs itself under.
    pub fn global_name(&self) -> &str {
        &self.global_name
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Reads the next buffered chunk; settles with data, EOF or an error.
    pub fn read_next_chunk(&self, id: HandleId) -> PendingOperation<ReadChunk> {
        debug!(handle = %id, "readNextChunk");
        let (done, pending) = self.completion();
        self.bridge.read_next_chunk(id, done);
        pending
    }

    /// Appends `data`; settles with the number of bytes written.
    pub fn write(&self, id: HandleId, data: impl Into<Bytes>) -> PendingOperation<usize> {
        let data = data.into();
        debug!(handle = %id, len = data.len(), "write");
        let (done, pending) = self.completion();
        self.bridge.write(id, data, done);
        pending
    }

    pub fn flush(&self, id: HandleId) -> PendingOperation<()> {
        debug!(handle = %id, "flush");
        let (done, pending) = self.completion();
        self.bridge.flush(id, done);
        pending
    }

    /// Releases a handle. Failures are logged, never reported.
    pub fn close(&self, id: HandleId) {
        debug!(handle = %id, "close");
        self.bridge.close(id);
    }

    /// Begins or resumes a download.
    ///
    /// `on_progress` runs on the logical thread, zero or more times, and never
    /// after the returned operation has settled.
    pub fn start_download<F>(&self, id: HandleId, on_progress: F) -> PendingOperation<()>
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        debug!(handle = %id, "startDownload");
        let settled = Arc::new(AtomicBool::new(false));
        let on_progress = Arc::new(on_progress);

        let callbacks = self.callbacks.clone();
        let progress_settled = Arc::clone(&settled);
        let progress: ProgressFn = Arc::new(move |sample| {
            let on_progress = Arc::clone(&on_progress);
            let settled = Arc::clone(&progress_settled);
            callbacks.deliver(move || {
                if !settled.load(Ordering::Acquire) {
                    on_progress(sample);
                }
            });
        });

        let (settlement, pending) = PendingOperation::channel();
        let callbacks = self.callbacks.clone();
        let done: Completion<()> = Box::new(move |result| {
            let settle_flag = settled;
            callbacks.deliver(move || {
                settle_flag.store(true, Ordering::Release);
                let _ = settlement.send(result);
            });
        });

        self.bridge.start_download(id, progress, done);
        pending
    }

    /// Requests cancellation. Best effort and synchronous.
    pub fn cancel_download(&self, id: HandleId) {
        debug!(handle = %id, "cancelDownload");
        self.bridge.cancel_download(id);
    }

    /// Reader snapshot; unknown handles yield zeroes.
    pub fn reader_info(&self, id: HandleId) -> ReaderInfo {
        self.bridge.reader_info(id)
    }

    /// Writer snapshot; unknown handles yield zero.
    pub fn writer_info(&self, id: HandleId) -> WriterInfo {
        self.bridge.writer_info(id)
    }

    /// Revokes liveness. Later deliveries are discarded on the logical thread.
    pub fn teardown(&self) {
        if self.liveness.revoke() {
            debug!(global = %self.global_name, "Streaming façade torn down");
        }
    }

    /// A completion that settles `PendingOperation` through the callback bridge.
    fn completion<T>(&self) -> (Completion<T>, PendingOperation<T>)
    where
        T: Send + 'static,
    {
        let (settlement, pending) = PendingOperation::channel();
        let callbacks = self.callbacks.clone();
        let done: Completion<T> = Box::new(move |result| callbacks.settle(settlement, result));
        (done, pending)
    }
}

impl Drop for StreamingFacade {
    fn drop(&mut self) {
        self.teardown();
    }
}
