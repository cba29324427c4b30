//! # Desktop Bridge Implementations
//!
//! A [`HandleRegistry`](bridge_traits::HandleRegistry) for desktop platforms
//! (macOS, Windows, Linux) backed by `std::fs` and `reqwest`.
//!
//! ## Overview
//!
//! - [`FileReader`] reads a local file in fixed-size chunks
//! - [`FileWriter`] writes or appends to a local file
//! - [`Downloader`] fetches a URL to disk with resume and cooperative cancel
//! - [`DesktopRegistry`] maps integer handles onto all three
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_desktop::{DesktopRegistry, ReaderOptions};
//! use core_runtime::StreamingConfig;
//! use core_streaming::{EventLoop, StreamingFacade};
//!
//! let registry = Arc::new(DesktopRegistry::new());
//! let event_loop = EventLoop::new();
//! let config = StreamingConfig::builder()
//!     .registry(registry.clone())
//!     .invoker(event_loop.invoker())
//!     .build()?;
//! let facade = StreamingFacade::new(&config)?;
//! let id = registry.open_read("song.flac", ReaderOptions::default())?;
//! let chunk = facade.read_next_chunk(id);
//! ```

mod download;
mod io_error;
mod reader;
mod registry;
mod writer;

pub use download::{DownloadRequest, DownloadSettings, Downloader};
pub use reader::{FileReader, ReaderOptions, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use registry::DesktopRegistry;
pub use writer::FileWriter;
