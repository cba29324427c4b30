//! In-process handle registry backed by the local filesystem and `reqwest`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bridge_traits::error::Result;
use bridge_traits::{
    BridgeError, DownloadCounters, ErrorCode, HandleId, HandleRegistry, RegistryCapabilities,
};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::download::{DownloadRequest, DownloadSettings, Downloader};
use crate::reader::{FileReader, ReaderOptions};
use crate::writer::FileWriter;

#[derive(Debug, Clone)]
enum Entry {
    Reader(Arc<FileReader>),
    Writer(Arc<FileWriter>),
    Download(Arc<Downloader>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Reader(_) => "reader",
            Entry::Writer(_) => "writer",
            Entry::Download(_) => "download",
        }
    }
}

/// Desktop registry of open readers, writers and downloads.
///
/// Handle ids start at 1 and are never reused. The map lock is only held to
/// look up or remove an entry; all I/O happens on the resource itself.
#[derive(Debug)]
pub struct DesktopRegistry {
    next_id: AtomicI32,
    entries: RwLock<HashMap<i32, Entry>>,
    download_settings: DownloadSettings,
}

impl Default for DesktopRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopRegistry {
    pub fn new() -> Self {
        Self::with_download_settings(DownloadSettings::default())
    }

    pub fn with_download_settings(download_settings: DownloadSettings) -> Self {
        Self {
            next_id: AtomicI32::new(1),
            entries: RwLock::new(HashMap::new()),
            download_settings,
        }
    }

    /// Opens `path` for chunked reading and returns its handle.
    pub fn open_read(&self, path: impl AsRef<Path>, options: ReaderOptions) -> Result<HandleId> {
        let reader = FileReader::open(path.as_ref(), options)?;
        Ok(self.insert(Entry::Reader(Arc::new(reader))))
    }

    /// Opens `path` for writing, appending when `append` is set.
    pub fn open_write(&self, path: impl AsRef<Path>, append: bool) -> Result<HandleId> {
        let writer = FileWriter::open(path.as_ref(), append)?;
        Ok(self.insert(Entry::Writer(Arc::new(writer))))
    }

    /// Registers a download. Nothing is fetched until `start_download`.
    pub fn create_download(&self, request: DownloadRequest) -> Result<HandleId> {
        if request.url.trim().is_empty() {
            return Err(BridgeError::coded(
                ErrorCode::InvalidArgument,
                "Download URL must not be empty",
            ));
        }
        let downloader = Downloader::new(request, self.download_settings.clone());
        Ok(self.insert(Entry::Download(Arc::new(downloader))))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, entry: Entry) -> HandleId {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(handle = raw, kind = entry.kind(), "Registered handle");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(raw, entry);
        HandleId::new(raw)
    }

    fn lookup(&self, id: HandleId) -> Option<Entry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id.get())
            .cloned()
    }

    fn reader(&self, id: HandleId) -> Result<Arc<FileReader>> {
        match self.lookup(id) {
            Some(Entry::Reader(reader)) => Ok(reader),
            _ => Err(BridgeError::coded(
                ErrorCode::ReaderClosed,
                format!("Reader handle not found: {}", id),
            )),
        }
    }

    fn writer(&self, id: HandleId) -> Result<Arc<FileWriter>> {
        match self.lookup(id) {
            Some(Entry::Writer(writer)) => Ok(writer),
            _ => Err(BridgeError::coded(
                ErrorCode::WriterClosed,
                format!("Writer handle not found: {}", id),
            )),
        }
    }

    fn download(&self, id: HandleId) -> Result<Arc<Downloader>> {
        match self.lookup(id) {
            Some(Entry::Download(download)) => Ok(download),
            _ => Err(BridgeError::coded(
                ErrorCode::DownloadFailed,
                format!("Download handle not found: {}", id),
            )),
        }
    }
}

impl HandleRegistry for DesktopRegistry {
    fn capabilities(&self) -> RegistryCapabilities {
        RegistryCapabilities {
            download_progress: true,
        }
    }

    fn read_next_chunk(&self, id: HandleId) -> Result<Option<Bytes>> {
        self.reader(id)?.read_chunk()
    }

    fn write(&self, id: HandleId, data: &[u8]) -> Result<usize> {
        self.writer(id)?.write(data)
    }

    fn flush(&self, id: HandleId) -> Result<()> {
        self.writer(id)?.flush()
    }

    fn close(&self, id: HandleId) -> Result<()> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.get());

        match removed {
            Some(Entry::Reader(reader)) => reader.close(),
            Some(Entry::Writer(writer)) => {
                if let Err(e) = writer.close() {
                    warn!(handle = %id, error = %e, "Writer close failed");
                }
            }
            Some(Entry::Download(download)) => download.cancel(),
            None => debug!(handle = %id, "Close on unknown handle"),
        }
        Ok(())
    }

    fn start_download(&self, id: HandleId) -> Result<()> {
        self.download(id)?.run()
    }

    fn cancel_download(&self, id: HandleId) -> Result<()> {
        if let Some(Entry::Download(download)) = self.lookup(id) {
            download.cancel();
        }
        Ok(())
    }

    fn download_bytes_downloaded(&self, id: HandleId) -> Result<u64> {
        Ok(self.download(id)?.bytes_downloaded())
    }

    fn download_total_bytes(&self, id: HandleId) -> Result<i64> {
        Ok(self.download(id)?.total_bytes())
    }

    fn download_counters(&self, id: HandleId) -> Result<DownloadCounters> {
        Ok(self.download(id)?.counters())
    }

    fn reader_file_size(&self, id: HandleId) -> Result<u64> {
        Ok(self.reader(id)?.file_size())
    }

    fn reader_bytes_read(&self, id: HandleId) -> Result<u64> {
        Ok(self.reader(id)?.bytes_read())
    }

    fn reader_is_eof(&self, id: HandleId) -> Result<bool> {
        Ok(self.reader(id)?.is_eof())
    }

    fn writer_bytes_written(&self, id: HandleId) -> Result<u64> {
        Ok(self.writer(id)?.bytes_written())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let registry = DesktopRegistry::new();
        let file = temp_file(b"abc");
        let first = registry.open_read(file.path(), ReaderOptions::default()).unwrap();
        let second = registry.open_read(file.path(), ReaderOptions::default()).unwrap();
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_read_until_eof() {
        let registry = DesktopRegistry::new();
        let file = temp_file(&[7u8; 5000]);
        let id = registry.open_read(file.path(), ReaderOptions::with_buffer_size(4096)).unwrap();

        assert_eq!(registry.reader_file_size(id).unwrap(), 5000);
        assert_eq!(registry.read_next_chunk(id).unwrap().unwrap().len(), 4096);
        assert_eq!(registry.read_next_chunk(id).unwrap().unwrap().len(), 904);
        assert!(registry.read_next_chunk(id).unwrap().is_none());
        assert!(registry.reader_is_eof(id).unwrap());
        assert_eq!(registry.reader_bytes_read(id).unwrap(), 5000);
    }

    #[test]
    fn test_handle_kinds_do_not_mix() {
        let registry = DesktopRegistry::new();
        let file = temp_file(b"abc");
        let id = registry.open_read(file.path(), ReaderOptions::default()).unwrap();

        let err = registry.write(id, b"x").unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("[WRITER_CLOSED] Writer handle not found: {}", id)
        );
        let err = registry.start_download(id).unwrap_err();
        assert!(err.to_string().starts_with("[DOWNLOAD_FAILED] Download handle not found"));
    }

    #[test]
    fn test_write_flush_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.bin");
        let registry = DesktopRegistry::new();
        let id = registry.open_write(&path, false).unwrap();

        assert_eq!(registry.write(id, b"hello ").unwrap(), 6);
        assert_eq!(registry.write(id, b"world").unwrap(), 5);
        registry.flush(id).unwrap();
        assert_eq!(registry.writer_bytes_written(id).unwrap(), 11);
        registry.close(id).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
        assert!(registry.is_empty());
        let err = registry.write(id, b"!").unwrap_err();
        assert!(err.to_string().starts_with("[WRITER_CLOSED]"));
    }

    #[test]
    fn test_close_unknown_handle_is_ok() {
        let registry = DesktopRegistry::new();
        registry.close(HandleId::new(42)).unwrap();
        registry.close(HandleId::new(-1)).unwrap();
    }

    #[test]
    fn test_missing_reader_message() {
        let registry = DesktopRegistry::new();
        let err = registry.read_next_chunk(HandleId::new(9)).unwrap_err();
        assert_eq!(err.to_string(), "[READER_CLOSED] Reader handle not found: 9");
    }

    #[test]
    fn test_empty_download_url_rejected() {
        let registry = DesktopRegistry::new();
        let err = registry
            .create_download(DownloadRequest::new("  ", "/tmp/out.bin"))
            .unwrap_err();
        assert!(err.to_string().starts_with("[INVALID_ARGUMENT]"));
    }

    #[test]
    fn test_cancelled_download_fails_fast() {
        let registry = DesktopRegistry::new();
        let id = registry
            .create_download(DownloadRequest::new("http://127.0.0.1:9/x", "/tmp/never.bin"))
            .unwrap();
        registry.cancel_download(id).unwrap();
        let err = registry.start_download(id).unwrap_err();
        assert_eq!(err.to_string(), "[DOWNLOAD_CANCELLED] Download was cancelled");
        assert_eq!(
            registry.download_counters(id).unwrap(),
            DownloadCounters {
                bytes_downloaded: 0,
                total_bytes: -1
            }
        );
    }
}
