//! # Host Dispatch
//!
//! Closed operation table and the loosely typed value model used when a
//! script environment calls into the façade by name.
//!
//! ## Overview
//!
//! Script hosts pass numbers as `f64`, byte payloads as array buffers and
//! callbacks as function objects. [`StreamingFacade::invoke`] checks the
//! argument shape for one [`Operation`], coerces the handle id and forwards
//! to the typed façade method. Shape errors are reported synchronously as
//! [`StreamError::InvalidArgument`]; a well-formed call with an unknown handle
//! never fails synchronously.
//!
//! ## Installation
//!
//! ```ignore
//! use core_streaming::{StreamingFacade, HostEnvironment};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let mut globals: HashMap<String, Arc<StreamingFacade>> = HashMap::new();
//! StreamingFacade::install(Arc::new(facade), &mut globals)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bridge_traits::{HandleId, ReaderInfo, WriterInfo};
use bytes::Bytes;
use tracing::info;

use crate::bridge::ReadChunk;
use crate::download::DownloadProgress;
use crate::error::{Result, StreamError};
use crate::facade::StreamingFacade;
use crate::pending::PendingOperation;

/// Every operation the façade exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadNextChunk,
    Write,
    Flush,
    Close,
    StartDownload,
    CancelDownload,
    GetReaderInfo,
    GetWriterInfo,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::ReadNextChunk,
        Operation::Write,
        Operation::Flush,
        Operation::Close,
        Operation::StartDownload,
        Operation::CancelDownload,
        Operation::GetReaderInfo,
        Operation::GetWriterInfo,
    ];

    /// Property name seen by the script environment.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ReadNextChunk => "readNextChunk",
            Operation::Write => "write",
            Operation::Flush => "flush",
            Operation::Close => "close",
            Operation::StartDownload => "startDownload",
            Operation::CancelDownload => "cancelDownload",
            Operation::GetReaderInfo => "getReaderInfo",
            Operation::GetWriterInfo => "getWriterInfo",
        }
    }

    /// Minimum number of arguments.
    pub fn arity(&self) -> usize {
        match self {
            Operation::Write | Operation::StartDownload => 2,
            _ => 1,
        }
    }

    /// Whether the operation returns a pending result.
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            Operation::ReadNextChunk
                | Operation::Write
                | Operation::Flush
                | Operation::StartDownload
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| StreamError::InvalidArgument(format!("unknown operation: {}", s)))
    }
}

/// Script callback. Receives the progress triple
/// `(bytesDownloaded, totalBytes, progress)` as numbers.
pub type HostFunction = Arc<dyn Fn(&[HostValue]) + Send + Sync + 'static>;

/// A value crossing the script boundary.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Bytes),
    Function(HostFunction),
}

impl HostValue {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) + Send + Sync + 'static,
    {
        HostValue::Function(Arc::new(f))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Bytes(_) => "ArrayBuffer",
            HostValue::Function(_) => "function",
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("Undefined"),
            HostValue::Null => f.write_str("Null"),
            HostValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            HostValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            HostValue::String(s) => f.debug_tuple("String").field(s).finish(),
            HostValue::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            HostValue::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<DownloadProgress> for [HostValue; 3] {
    fn from(sample: DownloadProgress) -> Self {
        [
            HostValue::Number(sample.bytes_downloaded as f64),
            HostValue::Number(sample.total_bytes as f64),
            HostValue::Number(sample.progress),
        ]
    }
}

/// Result of a dynamic call.
#[derive(Debug)]
pub enum HostReturn {
    Undefined,
    Chunk(PendingOperation<ReadChunk>),
    Count(PendingOperation<usize>),
    Done(PendingOperation<()>),
    ReaderInfo(ReaderInfo),
    WriterInfo(WriterInfo),
}

impl HostReturn {
    /// Plain record for synchronous results, as the script sees it.
    pub fn to_record(&self) -> Option<serde_json::Value> {
        match self {
            HostReturn::ReaderInfo(info) => serde_json::to_value(info).ok(),
            HostReturn::WriterInfo(info) => serde_json::to_value(info).ok(),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            HostReturn::Chunk(_) | HostReturn::Count(_) | HostReturn::Done(_)
        )
    }
}

/// Global namespace of a script environment.
pub trait HostEnvironment {
    fn has_global(&self, name: &str) -> bool;

    fn define_global(&mut self, name: &str, facade: Arc<StreamingFacade>);
}

impl HostEnvironment for HashMap<String, Arc<StreamingFacade>> {
    fn has_global(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn define_global(&mut self, name: &str, facade: Arc<StreamingFacade>) {
        self.insert(name.to_string(), facade);
    }
}

impl StreamingFacade {
    /// Property names the installed object exposes.
    pub fn property_names() -> impl Iterator<Item = &'static str> {
        Operation::ALL.into_iter().map(|op| op.name())
    }

    /// Publishes `facade` under its global name.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AlreadyInstalled`] if the environment already
    /// defines that name.
    pub fn install<E>(facade: Arc<StreamingFacade>, env: &mut E) -> Result<()>
    where
        E: HostEnvironment + ?Sized,
    {
        let name = facade.global_name().to_string();
        if env.has_global(&name) {
            return Err(StreamError::AlreadyInstalled(name));
        }
        env.define_global(&name, facade);
        info!(global = %name, "Streaming façade installed");
        Ok(())
    }

    /// Dynamic entry point used by script bindings.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidArgument`] when fewer than
    /// [`Operation::arity`] arguments are given or an argument has the wrong
    /// shape. Failures of the operation itself are reported through the
    /// returned pending value.
    pub fn invoke(&self, op: Operation, args: &[HostValue]) -> Result<HostReturn> {
        if args.len() < op.arity() {
            let noun = if op.arity() == 1 { "argument" } else { "arguments" };
            return Err(StreamError::InvalidArgument(format!(
                "{} requires {} {}",
                op,
                op.arity(),
                noun
            )));
        }

        let id = handle_arg(op, &args[0])?;

        Ok(match op {
            Operation::ReadNextChunk => HostReturn::Chunk(self.read_next_chunk(id)),
            Operation::Write => {
                let data = match &args[1] {
                    HostValue::Bytes(data) => data.clone(),
                    other => {
                        return Err(StreamError::InvalidArgument(format!(
                            "write expects an ArrayBuffer, got {}",
                            other.type_name()
                        )))
                    }
                };
                HostReturn::Count(self.write(id, data))
            }
            Operation::Flush => HostReturn::Done(self.flush(id)),
            Operation::Close => {
                self.close(id);
                HostReturn::Undefined
            }
            Operation::StartDownload => {
                let callback = match &args[1] {
                    HostValue::Function(f) => Arc::clone(f),
                    other => {
                        return Err(StreamError::InvalidArgument(format!(
                            "startDownload expects a progress function, got {}",
                            other.type_name()
                        )))
                    }
                };
                HostReturn::Done(self.start_download(id, move |sample| {
                    let args: [HostValue; 3] = sample.into();
                    callback(&args[..]);
                }))
            }
            Operation::CancelDownload => {
                self.cancel_download(id);
                HostReturn::Undefined
            }
            Operation::GetReaderInfo => HostReturn::ReaderInfo(self.reader_info(id)),
            Operation::GetWriterInfo => HostReturn::WriterInfo(self.writer_info(id)),
        })
    }

    /// Like [`invoke`](Self::invoke), resolving the operation by its property name.
    pub fn invoke_by_name(&self, name: &str, args: &[HostValue]) -> Result<HostReturn> {
        self.invoke(name.parse()?, args)
    }
}

/// Coerces the handle argument. Numbers that are not valid ids become
/// [`HandleId::INVALID`]; non-numbers are a shape error.
fn handle_arg(op: Operation, value: &HostValue) -> Result<HandleId> {
    match value {
        HostValue::Number(n) => Ok(HandleId::from_host_number(*n)),
        other => Err(StreamError::InvalidArgument(format!(
            "{} expects a numeric handle id, got {}",
            op,
            other.type_name()
        ))),
    }
}
