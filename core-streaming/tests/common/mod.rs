//! In-memory registry shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use bridge_traits::error::Result;
use bridge_traits::{BridgeError, ErrorCode, HandleId, HandleRegistry, RegistryCapabilities};
use bytes::Bytes;
use core_runtime::StreamingConfig;
use core_streaming::{EventLoop, StreamingFacade};

pub struct MemoryReader {
    pub data: Vec<u8>,
    pub chunk: usize,
    pub pos: usize,
}

pub struct MemoryDownload {
    pub total: i64,
    pub steps: u64,
    pub step_bytes: u64,
    pub downloaded: Arc<AtomicU64>,
    pub cancelled: Arc<AtomicBool>,
}

/// A latch the registry waits on inside `read_next_chunk`.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
    entered: AtomicBool,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn wait_entered(&self) {
        while !self.entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn pass(&self) {
        self.entered.store(true, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    pub readers: Mutex<HashMap<i32, MemoryReader>>,
    pub writers: Mutex<HashMap<i32, Vec<u8>>>,
    pub flushed: Mutex<Vec<i32>>,
    pub closed: Mutex<Vec<i32>>,
    pub downloads: Mutex<HashMap<i32, MemoryDownload>>,
    pub read_gate: Option<Arc<Gate>>,
    pub no_progress: bool,
}

impl MemoryRegistry {
    pub fn add_reader(&self, id: i32, data: &[u8], chunk: usize) {
        self.readers.lock().unwrap().insert(
            id,
            MemoryReader {
                data: data.to_vec(),
                chunk,
                pos: 0,
            },
        );
    }

    pub fn add_writer(&self, id: i32) {
        self.writers.lock().unwrap().insert(id, Vec::new());
    }

    pub fn add_download(&self, id: i32, total: i64, steps: u64, step_bytes: u64) {
        self.downloads.lock().unwrap().insert(
            id,
            MemoryDownload {
                total,
                steps,
                step_bytes,
                downloaded: Arc::new(AtomicU64::new(0)),
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        );
    }

    pub fn written(&self, id: i32) -> Vec<u8> {
        self.writers
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

fn reader_missing(id: HandleId) -> BridgeError {
    BridgeError::coded(ErrorCode::ReaderClosed, format!("Reader handle not found: {}", id))
}

fn writer_missing(id: HandleId) -> BridgeError {
    BridgeError::coded(ErrorCode::WriterClosed, format!("Writer handle not found: {}", id))
}

impl HandleRegistry for MemoryRegistry {
    fn capabilities(&self) -> RegistryCapabilities {
        RegistryCapabilities {
            download_progress: !self.no_progress,
        }
    }

    fn read_next_chunk(&self, id: HandleId) -> Result<Option<Bytes>> {
        if let Some(gate) = &self.read_gate {
            gate.pass();
        }
        let mut readers = self.readers.lock().unwrap();
        let reader = readers.get_mut(&id.get()).ok_or_else(|| reader_missing(id))?;
        if reader.pos >= reader.data.len() {
            return Ok(None);
        }
        let end = (reader.pos + reader.chunk).min(reader.data.len());
        let chunk = Bytes::copy_from_slice(&reader.data[reader.pos..end]);
        reader.pos = end;
        Ok(Some(chunk))
    }

    fn write(&self, id: HandleId, data: &[u8]) -> Result<usize> {
        if data.starts_with(b"PANIC") {
            panic!("writer exploded");
        }
        let mut writers = self.writers.lock().unwrap();
        let buffer = writers.get_mut(&id.get()).ok_or_else(|| writer_missing(id))?;
        buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&self, id: HandleId) -> Result<()> {
        if !self.writers.lock().unwrap().contains_key(&id.get()) {
            return Err(writer_missing(id));
        }
        self.flushed.lock().unwrap().push(id.get());
        Ok(())
    }

    fn close(&self, id: HandleId) -> Result<()> {
        self.closed.lock().unwrap().push(id.get());
        let removed = self.readers.lock().unwrap().remove(&id.get()).is_some()
            | self.writers.lock().unwrap().remove(&id.get()).is_some()
            | self.downloads.lock().unwrap().remove(&id.get()).is_some();
        if removed {
            Ok(())
        } else {
            Err(BridgeError::OperationFailed(format!("unknown handle {}", id)))
        }
    }

    fn start_download(&self, id: HandleId) -> Result<()> {
        let (steps, step_bytes, downloaded, cancelled) = {
            let downloads = self.downloads.lock().unwrap();
            let download = downloads.get(&id.get()).ok_or_else(|| {
                BridgeError::coded(
                    ErrorCode::DownloadFailed,
                    format!("Downloader handle not found: {}", id),
                )
            })?;
            (
                download.steps,
                download.step_bytes,
                Arc::clone(&download.downloaded),
                Arc::clone(&download.cancelled),
            )
        };

        for _ in 0..steps {
            if cancelled.load(Ordering::SeqCst) {
                return Err(BridgeError::coded(
                    ErrorCode::DownloadCancelled,
                    "Download was cancelled",
                ));
            }
            thread::sleep(Duration::from_millis(5));
            downloaded.fetch_add(step_bytes, Ordering::SeqCst);
        }
        Ok(())
    }

    fn cancel_download(&self, id: HandleId) -> Result<()> {
        match self.downloads.lock().unwrap().get(&id.get()) {
            Some(download) => {
                download.cancelled.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(BridgeError::OperationFailed(format!("no download {}", id))),
        }
    }

    fn download_bytes_downloaded(&self, id: HandleId) -> Result<u64> {
        self.downloads
            .lock()
            .unwrap()
            .get(&id.get())
            .map(|d| d.downloaded.load(Ordering::SeqCst))
            .ok_or_else(|| BridgeError::OperationFailed("no download".to_string()))
    }

    fn download_total_bytes(&self, id: HandleId) -> Result<i64> {
        self.downloads
            .lock()
            .unwrap()
            .get(&id.get())
            .map(|d| d.total)
            .ok_or_else(|| BridgeError::OperationFailed("no download".to_string()))
    }

    fn reader_file_size(&self, id: HandleId) -> Result<u64> {
        self.readers
            .lock()
            .unwrap()
            .get(&id.get())
            .map(|r| r.data.len() as u64)
            .ok_or_else(|| reader_missing(id))
    }

    fn reader_bytes_read(&self, id: HandleId) -> Result<u64> {
        self.readers
            .lock()
            .unwrap()
            .get(&id.get())
            .map(|r| r.pos as u64)
            .ok_or_else(|| reader_missing(id))
    }

    fn reader_is_eof(&self, id: HandleId) -> Result<bool> {
        self.readers
            .lock()
            .unwrap()
            .get(&id.get())
            .map(|r| r.pos >= r.data.len())
            .ok_or_else(|| reader_missing(id))
    }

    fn writer_bytes_written(&self, id: HandleId) -> Result<u64> {
        self.writers
            .lock()
            .unwrap()
            .get(&id.get())
            .map(|w| w.len() as u64)
            .ok_or_else(|| writer_missing(id))
    }
}

/// A façade over `registry`, driven by a fresh event loop.
pub fn facade_with(registry: Arc<MemoryRegistry>) -> (StreamingFacade, EventLoop) {
    let event_loop = EventLoop::new();
    let config = StreamingConfig::builder()
        .registry(registry)
        .invoker(event_loop.invoker())
        .progress_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    let facade = StreamingFacade::new(&config).unwrap();
    (facade, event_loop)
}
