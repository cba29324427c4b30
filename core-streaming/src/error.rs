//! Error types surfaced to the logical thread.

use bridge_traits::BridgeError;
use thiserror::Error;

pub use bridge_traits::ErrorCode;

/// Failure of a façade operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The registry reported a failure. `message` is the registry text with
    /// any `"[CODE]"` prefix removed.
    #[error("[{code}]{}", with_separator(.message))]
    Native { code: ErrorCode, message: String },

    /// The call itself was malformed (missing arguments, wrong value shape).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The façade was torn down before the settlement could be delivered.
    #[error("Streaming façade was torn down before the operation settled")]
    Detached,

    #[error("Global '{0}' is already installed")]
    AlreadyInstalled(String),
}

impl StreamError {
    /// Wrap a registry message, recovering its `"[CODE]"` prefix when present.
    pub fn from_native(message: impl AsRef<str>) -> Self {
        let (code, message) = ErrorCode::parse_message(message.as_ref());
        StreamError::Native { code, message }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StreamError::Native { code, .. } => *code,
            StreamError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            StreamError::Detached | StreamError::AlreadyInstalled(_) => ErrorCode::Unknown,
        }
    }

    pub(crate) fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        StreamError::Native {
            code: ErrorCode::Unknown,
            message: format!("task panicked: {}", detail),
        }
    }
}

impl From<BridgeError> for StreamError {
    fn from(err: BridgeError) -> Self {
        StreamError::from_native(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

fn with_separator(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" {}", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_native_parses_code() {
        let err = StreamError::from_native("[WRITER_CLOSED] Writer handle not found: 4");
        assert_eq!(err.code(), ErrorCode::WriterClosed);
        assert_eq!(
            err,
            StreamError::Native {
                code: ErrorCode::WriterClosed,
                message: "Writer handle not found: 4".to_string(),
            }
        );
        assert_eq!(err.to_string(), "[WRITER_CLOSED] Writer handle not found: 4");
    }

    #[test]
    fn test_bare_code_displays_once() {
        let err = StreamError::from_native("[IO_ERROR]");
        assert_eq!(err.code(), ErrorCode::IoError);
        assert_eq!(err.to_string(), "[IO_ERROR]");
    }

    #[test]
    fn test_plain_message_kept_verbatim() {
        match StreamError::from_native("disk quota exceeded") {
            StreamError::Native { code, message } => {
                assert_eq!(code, ErrorCode::Unknown);
                assert_eq!(message, "disk quota exceeded");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_bridge_error_is_native() {
        let err: StreamError = BridgeError::Unsupported("flush").into();
        assert_eq!(err.code(), ErrorCode::Unknown);
        assert!(err
            .to_string()
            .contains("flush is not supported by this handle registry"));
    }

    #[test]
    fn test_panic_payloads() {
        let err = StreamError::panicked(&"boom");
        assert!(err.to_string().contains("task panicked: boom"));

        let err = StreamError::panicked(&String::from("owned boom"));
        assert!(err.to_string().contains("owned boom"));
    }
}
