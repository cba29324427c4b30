//! # Core Streaming
//!
//! Off-thread execution of handle-based blob I/O for a single-threaded script
//! environment.
//!
//! ## Overview
//!
//! A script thread must never block on file or network I/O, yet it needs the
//! results back on that same thread. This crate provides:
//!
//! - [`WorkerPool`] - bounded pool for short reads, writes and flushes
//! - [`DownloadCoordinator`] - dedicated driver and poller threads per download
//! - [`CallbackBridge`] - hops completions onto the logical thread, gated by
//!   the façade's [`Liveness`]
//! - [`StreamingFacade`] - the operation surface, plus dynamic dispatch via
//!   [`Operation`] and [`HostValue`]
//! - [`EventLoop`] - a reference logical thread for hosts and tests
//!
//! ## Data Flow
//!
//! ```text
//! StreamingFacade ─→ StreamingBridge ─→ WorkerPool | DownloadCoordinator ─→ HandleRegistry
//!        ↑                                                                       │
//!        └──────── CallbackBridge (logical thread, liveness-gated) ←─ continuation ┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::StreamingConfig;
//! use core_streaming::{EventLoop, StreamingFacade};
//! use bridge_traits::HandleId;
//! use std::sync::Arc;
//!
//! let mut event_loop = EventLoop::new();
//! let config = StreamingConfig::builder()
//!     .registry(registry)
//!     .invoker(event_loop.invoker())
//!     .build()?;
//!
//! let facade = StreamingFacade::new(&config)?;
//! let written = event_loop.run_until(facade.write(HandleId::new(1), b"hello".to_vec())).await?;
//! ```

pub mod bridge;
pub mod callback;
pub mod download;
pub mod error;
pub mod event_loop;
pub mod facade;
pub mod host;
pub mod pending;
pub mod pool;

pub use bridge::{ReadChunk, RegistryBridge, StreamingBridge};
pub use callback::{CallbackBridge, Liveness, LivenessToken};
pub use download::{
    Completion, DownloadCoordinator, DownloadProgress, DownloadState, DownloadTask, ProgressFn,
};
pub use error::{ErrorCode, Result, StreamError};
pub use event_loop::{EventLoop, LoopInvoker};
pub use facade::StreamingFacade;
pub use host::{HostEnvironment, HostFunction, HostReturn, HostValue, Operation};
pub use pending::PendingOperation;
pub use pool::{PoolError, Task, WorkerPool};
