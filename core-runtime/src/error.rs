use thiserror::Error;

/// Failures while assembling the streaming runtime.
///
/// Operation failures never use this type; they travel back to the host as
/// `StreamError` values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Failed to start worker threads: {0}")]
    WorkerStartup(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
