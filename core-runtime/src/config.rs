//! # Streaming Configuration
//!
//! Builder-based configuration for the streaming core.
//!
//! ## Overview
//!
//! A [`StreamingConfig`] carries the two capabilities the core cannot work
//! without (the handle registry and the logical-thread invoker) together with
//! the tuning knobs of the worker pool and the download poller. The builder
//! fails fast with actionable messages when a capability is missing or a knob
//! is out of range.
//!
//! ## Required Dependencies
//!
//! - `HandleRegistry` - Owns the open resources and performs blocking I/O
//! - `CallInvoker` - Hops completions onto the host's logical thread
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::StreamingConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = StreamingConfig::builder()
//!     .registry(Arc::new(MyRegistry::default()))
//!     .invoker(js_call_invoker)
//!     .worker_threads(2)
//!     .progress_interval(Duration::from_millis(100))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{CallInvoker, HandleRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Default number of pooled worker threads for read/write/flush.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Upper bound on pooled worker threads.
pub const MAX_WORKER_THREADS: usize = 64;

/// Default cadence of the download progress poller.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

pub const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(10);
pub const MAX_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Global property name the façade is installed under.
pub const DEFAULT_GLOBAL_NAME: &str = "__BufferedBlobStreaming";

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "blob-stream";

/// Configuration for the streaming core.
///
/// Use [`StreamingConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct StreamingConfig {
    /// Handle registry that owns every open resource (required)
    pub registry: Arc<dyn HandleRegistry>,

    /// Async-invoke primitive for the logical thread (required)
    pub invoker: Arc<dyn CallInvoker>,

    /// Number of pooled worker threads
    pub worker_threads: usize,

    /// Interval between download progress samples
    pub progress_interval: Duration,

    /// Name of the global the façade is installed under
    pub global_name: String,

    /// Prefix for every thread the core spawns
    pub thread_name_prefix: String,
}

impl std::fmt::Debug for StreamingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingConfig")
            .field("registry", &"HandleRegistry { ... }")
            .field("invoker", &"CallInvoker { ... }")
            .field("worker_threads", &self.worker_threads)
            .field("progress_interval", &self.progress_interval)
            .field("global_name", &self.global_name)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .finish()
    }
}

impl StreamingConfig {
    pub fn builder() -> StreamingConfigBuilder {
        StreamingConfigBuilder::default()
    }

    /// Validates the tuning knobs.
    ///
    /// This checks:
    /// - Worker thread count is within `1..=64`
    /// - Progress interval is within 10ms..=10s
    /// - Global name and thread prefix are not empty
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config(
                "Worker pool needs at least one thread".to_string(),
            ));
        }

        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(Error::Config(format!(
                "Worker pool size {} exceeds maximum of {}",
                self.worker_threads, MAX_WORKER_THREADS
            )));
        }

        if self.progress_interval < MIN_PROGRESS_INTERVAL
            || self.progress_interval > MAX_PROGRESS_INTERVAL
        {
            return Err(Error::Config(format!(
                "Progress interval must be between {}ms and {}ms, got {}ms",
                MIN_PROGRESS_INTERVAL.as_millis(),
                MAX_PROGRESS_INTERVAL.as_millis(),
                self.progress_interval.as_millis()
            )));
        }

        if self.global_name.trim().is_empty() {
            return Err(Error::Config("Global name cannot be empty".to_string()));
        }

        if self.thread_name_prefix.trim().is_empty() {
            return Err(Error::Config(
                "Thread name prefix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn registry_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HandleRegistry".to_string(),
        message: "A HandleRegistry implementation is required to resolve handle ids. \
                 Desktop: enable the 'desktop-shims' feature and pass a DesktopRegistry. \
                 Mobile: inject the platform registry that owns reader/writer/downloader handles."
            .to_string(),
    }
}

fn invoker_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "CallInvoker".to_string(),
        message: "A CallInvoker is required to deliver completions on the logical thread. \
                 Inject the host runtime's async-invoke primitive, or an EventLoop invoker in tests."
            .to_string(),
    }
}

/// Builder for [`StreamingConfig`].
#[derive(Default)]
pub struct StreamingConfigBuilder {
    registry: Option<Arc<dyn HandleRegistry>>,
    invoker: Option<Arc<dyn CallInvoker>>,
    worker_threads: Option<usize>,
    progress_interval: Option<Duration>,
    global_name: Option<String>,
    thread_name_prefix: Option<String>,
}

impl StreamingConfigBuilder {
    /// Sets the handle registry (required).
    pub fn registry(mut self, registry: Arc<dyn HandleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the logical-thread invoker (required).
    pub fn invoker(mut self, invoker: Arc<dyn CallInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Sets the worker pool size.
    ///
    /// Default: 4
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Sets the download progress sampling interval.
    ///
    /// Default: 200ms
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Sets the global property name used by `install`.
    pub fn global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] when the registry or invoker was not
    /// provided, and [`Error::Config`] when a tuning knob is out of range.
    pub fn build(self) -> Result<StreamingConfig> {
        let registry = self.registry.ok_or_else(registry_missing_error)?;
        let invoker = self.invoker.ok_or_else(invoker_missing_error)?;

        let config = StreamingConfig {
            registry,
            invoker,
            worker_threads: self.worker_threads.unwrap_or(DEFAULT_WORKER_THREADS),
            progress_interval: self.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
            global_name: self
                .global_name
                .unwrap_or_else(|| DEFAULT_GLOBAL_NAME.to_string()),
            thread_name_prefix: self
                .thread_name_prefix
                .unwrap_or_else(|| DEFAULT_THREAD_NAME_PREFIX.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
