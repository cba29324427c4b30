//! Buffered blob streaming for embedded script hosts.
//!
//! This crate re-exports the workspace crates so a host application can depend
//! on a single package:
//!
//! - [`bridge_traits`] defines the handle registry and call invoker seams
//! - [`core_runtime`] holds configuration, errors and logging setup
//! - [`core_streaming`] implements the worker pool, download coordinator and façade
//! - `bridge_desktop` (feature `desktop-shims`, on by default) provides a
//!   filesystem and `reqwest` backed registry

pub use bridge_traits;
pub use core_runtime;
pub use core_streaming;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

pub use core_runtime::logging::{init_logging, LoggingConfig};
pub use core_runtime::StreamingConfig;
pub use core_streaming::{EventLoop, PendingOperation, StreamError, StreamingFacade};
