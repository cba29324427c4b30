//! Handle Registry contract
//!
//! The registry owns every open resource and performs the actual blocking I/O.
//! The streaming core calls these methods from worker, driver and poller
//! threads, so implementations must be internally synchronized.
//!
//! Every method has a default body. Async-style operations default to
//! [`BridgeError::Unsupported`], which the core reports through the
//! operation's error continuation with a fixed descriptive message. The two
//! best-effort cleanup calls default to no-ops.

use bytes::Bytes;

use crate::error::{BridgeError, Result};
use crate::handle::HandleId;
use crate::info::DownloadCounters;

/// Optional behaviours a registry advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryCapabilities {
    /// Download counters are maintained while `start_download` runs, so the
    /// core can poll them for progress.
    pub download_progress: bool,
}

impl Default for RegistryCapabilities {
    fn default() -> Self {
        Self {
            download_progress: true,
        }
    }
}

/// Thread-safe mapping from handle ids to open reader/writer/downloader resources.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::{HandleId, HandleRegistry};
///
/// fn drain(registry: &dyn HandleRegistry, id: HandleId) -> bridge_traits::error::Result<u64> {
///     let mut total = 0;
///     while let Some(chunk) = registry.read_next_chunk(id)? {
///         total += chunk.len() as u64;
///     }
///     Ok(total)
/// }
/// ```
pub trait HandleRegistry: Send + Sync {
    fn capabilities(&self) -> RegistryCapabilities {
        RegistryCapabilities::default()
    }

    /// Read the next buffered chunk; `Ok(None)` signals end of file.
    fn read_next_chunk(&self, id: HandleId) -> Result<Option<Bytes>> {
        let _ = id;
        Err(BridgeError::Unsupported("readNextChunk"))
    }

    /// Append bytes to a writer, returning the count written.
    fn write(&self, id: HandleId, data: &[u8]) -> Result<usize> {
        let _ = (id, data);
        Err(BridgeError::Unsupported("write"))
    }

    fn flush(&self, id: HandleId) -> Result<()> {
        let _ = id;
        Err(BridgeError::Unsupported("flush"))
    }

    /// Release a handle of any kind. Safe to call more than once.
    fn close(&self, id: HandleId) -> Result<()> {
        let _ = id;
        Ok(())
    }

    /// Run a download to completion, blocking the calling thread.
    ///
    /// Must return (with an error) once [`cancel_download`](Self::cancel_download)
    /// has been observed.
    fn start_download(&self, id: HandleId) -> Result<()> {
        let _ = id;
        Err(BridgeError::Unsupported("startDownload"))
    }

    /// Request cancellation of a running or future download.
    fn cancel_download(&self, id: HandleId) -> Result<()> {
        let _ = id;
        Ok(())
    }

    fn download_bytes_downloaded(&self, id: HandleId) -> Result<u64> {
        let _ = id;
        Err(BridgeError::Unsupported("getDownloadBytesDownloaded"))
    }

    /// Total size of the download, `<= 0` when unknown.
    fn download_total_bytes(&self, id: HandleId) -> Result<i64> {
        let _ = id;
        Err(BridgeError::Unsupported("getDownloadTotalBytes"))
    }

    fn download_counters(&self, id: HandleId) -> Result<DownloadCounters> {
        Ok(DownloadCounters {
            bytes_downloaded: self.download_bytes_downloaded(id)?,
            total_bytes: self.download_total_bytes(id)?,
        })
    }

    fn reader_file_size(&self, id: HandleId) -> Result<u64> {
        let _ = id;
        Err(BridgeError::Unsupported("getReaderFileSize"))
    }

    fn reader_bytes_read(&self, id: HandleId) -> Result<u64> {
        let _ = id;
        Err(BridgeError::Unsupported("getReaderBytesRead"))
    }

    fn reader_is_eof(&self, id: HandleId) -> Result<bool> {
        let _ = id;
        Err(BridgeError::Unsupported("getReaderIsEOF"))
    }

    fn writer_bytes_written(&self, id: HandleId) -> Result<u64> {
        let _ = id;
        Err(BridgeError::Unsupported("getWriterBytesWritten"))
    }
}
