//! Point-in-time snapshots read synchronously from the registry.

use serde::{Deserialize, Serialize};

/// Reader progress snapshot. Missing handles yield the zeroed default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderInfo {
    pub file_size: u64,
    pub bytes_read: u64,
    #[serde(rename = "isEOF")]
    pub is_eof: bool,
}

/// Writer progress snapshot. Missing handles yield the zeroed default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterInfo {
    pub bytes_written: u64,
}

/// Raw download counters as reported by the registry.
///
/// `total_bytes <= 0` means the total size is not known (no `Content-Length`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCounters {
    pub bytes_downloaded: u64,
    pub total_bytes: i64,
}

impl DownloadCounters {
    pub fn has_known_total(&self) -> bool {
        self.total_bytes > 0
    }
}
