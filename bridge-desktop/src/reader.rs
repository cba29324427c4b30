//! Buffered file reader handles.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use bridge_traits::error::Result;
use bridge_traits::{BridgeError, ErrorCode};
use bytes::Bytes;

use crate::io_error::{io_failure, path_error};

pub const MIN_BUFFER_SIZE: usize = 4096;
pub const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Options for [`FileReader::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Size of every chunk returned by `read_next_chunk` (the last may be shorter).
    pub buffer_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
        }
    }
}

impl ReaderOptions {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(BridgeError::coded(
                ErrorCode::InvalidArgument,
                format!(
                    "Buffer size must be {}-{}: {}",
                    MIN_BUFFER_SIZE, MAX_BUFFER_SIZE, self.buffer_size
                ),
            ));
        }
        Ok(())
    }
}

/// An open file read in fixed-size chunks.
#[derive(Debug)]
pub struct FileReader {
    file: Mutex<File>,
    buffer_size: usize,
    file_size: u64,
    bytes_read: AtomicU64,
    eof: AtomicBool,
    closed: AtomicBool,
}

impl FileReader {
    pub fn open(path: &Path, options: ReaderOptions) -> Result<Self> {
        options.validate()?;

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::coded(
                    ErrorCode::FileNotFound,
                    format!("File does not exist: {}", path.display()),
                )
            } else {
                path_error(&e, "Cannot stat file", path)
            }
        })?;

        if !metadata.is_file() {
            return Err(BridgeError::coded(
                ErrorCode::NotAFile,
                format!("Path is not a file: {}", path.display()),
            ));
        }

        let file = File::open(path).map_err(|e| path_error(&e, "Cannot open file", path))?;

        Ok(Self {
            file: Mutex::new(file),
            buffer_size: options.buffer_size,
            file_size: metadata.len(),
            bytes_read: AtomicU64::new(0),
            eof: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Reads up to `buffer_size` bytes. `Ok(None)` once the end is reached.
    pub fn read_chunk(&self) -> Result<Option<Bytes>> {
        if self.is_closed() {
            return Err(BridgeError::coded(ErrorCode::ReaderClosed, "Reader is closed"));
        }
        if self.is_eof() {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.buffer_size];
        let mut read = 0;
        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            // Fill the whole chunk; only the last one may come up short.
            while read < buffer.len() {
                match file.read(&mut buffer[read..]) {
                    Ok(0) => break,
                    Ok(n) => read += n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(io_failure(&e, "Read failed")),
                }
            }
        }

        if read == 0 {
            self.eof.store(true, Ordering::Release);
            return Ok(None);
        }

        buffer.truncate(read);
        self.bytes_read.fetch_add(read as u64, Ordering::AcqRel);
        Ok(Some(Bytes::from(buffer)))
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Acquire)
    }
}
