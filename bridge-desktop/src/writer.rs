//! File writer handles.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bridge_traits::error::Result;
use bridge_traits::{BridgeError, ErrorCode};

use crate::io_error::{io_failure, path_error};

/// An open file accepting appended bytes.
#[derive(Debug)]
pub struct FileWriter {
    file: Mutex<BufWriter<File>>,
    bytes_written: AtomicU64,
    closed: AtomicBool,
}

impl FileWriter {
    /// Opens `path` for writing, creating missing parent directories.
    /// Existing contents are kept when `append` is set and truncated otherwise.
    pub fn open(path: &Path, append: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| path_error(&e, "Cannot create directory", parent))?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }

        let file = options
            .open(path)
            .map_err(|e| path_error(&e, "Cannot open file for writing", path))?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            bytes_written: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut file = self.open_file()?;
        file.write_all(data)
            .map_err(|e| io_failure(&e, "Write failed"))?;
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::AcqRel);
        Ok(data.len())
    }

    pub fn flush(&self) -> Result<()> {
        self.open_file()?
            .flush()
            .map_err(|e| io_failure(&e, "Flush failed"))
    }

    /// Flushes and marks the writer closed. Later calls are no-ops.
    pub fn close(&self) -> Result<()> {
        let mut file = self.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        file.flush().map_err(|e| io_failure(&e, "Flush on close failed"))
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn open_file(&self) -> Result<MutexGuard<'_, BufWriter<File>>> {
        let file = self.lock();
        if self.is_closed() {
            return Err(BridgeError::coded(ErrorCode::WriterClosed, "Writer is closed"));
        }
        Ok(file)
    }

    fn lock(&self) -> MutexGuard<'_, BufWriter<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
