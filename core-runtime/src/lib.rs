//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the streaming crates:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! Everything here is ambient: it has no knowledge of handles or downloads.
//! `core-streaming` reads its tuning knobs from [`config::StreamingConfig`] and
//! hosts call [`logging::init_logging`] once at startup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::StreamingConfig;
pub use error::{Error, Result};
