//! HTTP downloader handles.
//!
//! A download runs on the caller's thread inside a private current-thread
//! Tokio runtime, so the blocking `start_download` contract holds without a
//! shared executor. Cancellation is cooperative through a
//! [`CancellationToken`] that is watched while connecting and between body
//! chunks.
//!
//! When the destination already holds a partial file the request asks for the
//! remainder with a `Range` header. A `206` reply is appended to the file, a
//! `200` reply replaces it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use bridge_traits::error::Result;
use bridge_traits::{BridgeError, DownloadCounters, ErrorCode};
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::io_error::{io_failure, path_error};

/// What to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub dest: PathBuf,
    pub headers: HashMap<String, String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// HTTP client settings applied to every download.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub connect_timeout: Duration,
    /// Maximum wait for the next body chunk.
    pub read_timeout: Duration,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            user_agent: format!("buffered-blob/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn cancelled() -> BridgeError {
    BridgeError::coded(ErrorCode::DownloadCancelled, "Download was cancelled")
}

fn failed(message: impl std::fmt::Display) -> BridgeError {
    BridgeError::coded(ErrorCode::DownloadFailed, message)
}

/// URL without its query string, for logs.
fn loggable_url(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// A single download and its live counters.
#[derive(Debug)]
pub struct Downloader {
    request: DownloadRequest,
    settings: DownloadSettings,
    cancel: CancellationToken,
    running: AtomicBool,
    downloaded: AtomicU64,
    total: AtomicI64,
}

impl Downloader {
    pub fn new(request: DownloadRequest, settings: DownloadSettings) -> Self {
        Self {
            request,
            settings,
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
            downloaded: AtomicU64::new(0),
            total: AtomicI64::new(-1),
        }
    }

    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    /// Runs the download to completion on the calling thread.
    pub fn run(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(failed("Download already in progress"));
        }

        let result = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| failed(format!("Cannot start download runtime: {}", e)))
            .and_then(|runtime| runtime.block_on(self.fetch()));

        self.running.store(false, Ordering::Release);
        match &result {
            Ok(()) => info!(url = %loggable_url(&self.request.url), bytes = self.bytes_downloaded(), "Download finished"),
            Err(e) => debug!(url = %loggable_url(&self.request.url), error = %e, "Download ended with error"),
        }
        result
    }

    /// Requests cancellation. Takes effect at the next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    /// Total size, `-1` until known.
    pub fn total_bytes(&self) -> i64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn counters(&self) -> DownloadCounters {
        DownloadCounters {
            bytes_downloaded: self.bytes_downloaded(),
            total_bytes: self.total_bytes(),
        }
    }

    async fn fetch(&self) -> Result<()> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .user_agent(self.settings.user_agent.clone())
            .build()
            .map_err(|e| failed(format!("Cannot build HTTP client: {}", e)))?;

        let dest = self.request.dest.as_path();
        let existing = tokio::fs::metadata(dest)
            .await
            .map(|m| if m.is_file() { m.len() } else { 0 })
            .unwrap_or(0);

        let mut builder = client.get(&self.request.url);
        for (name, value) in &self.request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if existing > 0 {
            builder = builder.header(RANGE, format!("bytes={}-", existing));
        }

        debug!(url = %loggable_url(&self.request.url), resume_from = existing, "Sending download request");

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(cancelled()),
            sent = builder.send() => sent.map_err(|e| {
                if e.is_timeout() {
                    failed("Connection timed out")
                } else {
                    failed(e)
                }
            })?,
        };

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
            // The partial file already holds everything the server has.
            self.total.store(existing as i64, Ordering::Release);
            self.downloaded.store(existing, Ordering::Release);
            return Ok(());
        }
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status.as_u16())));
        }

        let offset = if status == StatusCode::PARTIAL_CONTENT {
            existing
        } else {
            0
        };
        let total = response
            .content_length()
            .map(|len| (len + offset) as i64)
            .unwrap_or(-1);
        self.total.store(total, Ordering::Release);
        self.downloaded.store(offset, Ordering::Release);

        let mut file = open_destination(dest, offset > 0).await?;
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled()),
                next = tokio::time::timeout(self.settings.read_timeout, body.next()) => next,
            };

            match next {
                Err(_) => return Err(failed("Read timed out")),
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(failed(e)),
                Ok(Some(Ok(chunk))) => {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| io_failure(&e, "Write failed"))?;
                    self.downloaded
                        .fetch_add(chunk.len() as u64, Ordering::AcqRel);
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| io_failure(&e, "Flush failed"))?;
        Ok(())
    }
}

async fn open_destination(dest: &Path, append: bool) -> Result<File> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| path_error(&e, "Cannot create directory", parent))?;
    }

    let opened = if append {
        OpenOptions::new().append(true).open(dest).await
    } else {
        File::create(dest).await
    };
    opened.map_err(|e| path_error(&e, "Cannot open destination", dest))
}
