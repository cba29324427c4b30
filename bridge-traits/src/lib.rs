//! # Host Bridge Traits
//!
//! Capability contracts between the streaming core and the host that embeds it.
//!
//! ## Overview
//!
//! The streaming core never touches files or sockets itself. Every resource lives
//! in a platform-owned registry keyed by integer handles, and every result is
//! handed back to the host's single script thread through an asynchronous
//! invocation primitive. This crate defines both seams, plus the small value
//! types that cross them.
//!
//! ## Traits
//!
//! ### Resource access
//! - [`HandleRegistry`](registry::HandleRegistry) - Blocking, thread-safe operations on
//!   reader, writer and downloader handles
//!
//! ### Execution
//! - [`CallInvoker`](invoker::CallInvoker) - Hops a job onto the host's logical thread
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! Registries report failures through [`BridgeError`](error::BridgeError). Failure
//! messages follow the `"[CODE] message"` convention (see
//! [`ErrorCode`](error::ErrorCode)) so the host can recover a machine-readable code
//! without a second channel.
//!
//! ## Thread Safety
//!
//! Registry and invoker implementations are called from arbitrary worker and
//! download threads and must be `Send + Sync`.
//!
//! ## Examples
//!
//! ### Implementing a partial registry
//!
//! ```ignore
//! use bridge_traits::{HandleId, HandleRegistry};
//! use bridge_traits::error::Result;
//!
//! struct WriteOnlyRegistry;
//!
//! impl HandleRegistry for WriteOnlyRegistry {
//!     fn write(&self, id: HandleId, data: &[u8]) -> Result<usize> {
//!         // Forward to the platform stream
//!         Ok(data.len())
//!     }
//! }
//! ```

pub mod error;
pub mod handle;
pub mod info;
pub mod invoker;
pub mod logging;
pub mod registry;

pub use error::{BridgeError, ErrorCode};

// Re-export commonly used types
pub use handle::HandleId;
pub use info::{DownloadCounters, ReaderInfo, WriterInfo};
pub use invoker::{CallInvoker, InvokerJob};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use registry::{HandleRegistry, RegistryCapabilities};
