use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{0} is not supported by this handle registry")]
    Unsupported(&'static str),

    /// Failure reported by the registry; the message is surfaced verbatim.
    #[error("{0}")]
    OperationFailed(String),
}

impl BridgeError {
    /// Build a failure carrying the `"[CODE] message"` prefix.
    pub fn coded(code: ErrorCode, message: impl fmt::Display) -> Self {
        Self::OperationFailed(format!("[{}] {}", code.as_str(), message))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Machine-readable failure category carried in registry error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileNotFound,
    PermissionDenied,
    FileAlreadyExists,
    NotAFile,
    NotADirectory,
    DirectoryNotEmpty,
    IoError,
    InvalidArgument,
    DownloadFailed,
    DownloadCancelled,
    ReaderClosed,
    WriterClosed,
    Unknown,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 13] = [
        ErrorCode::FileNotFound,
        ErrorCode::PermissionDenied,
        ErrorCode::FileAlreadyExists,
        ErrorCode::NotAFile,
        ErrorCode::NotADirectory,
        ErrorCode::DirectoryNotEmpty,
        ErrorCode::IoError,
        ErrorCode::InvalidArgument,
        ErrorCode::DownloadFailed,
        ErrorCode::DownloadCancelled,
        ErrorCode::ReaderClosed,
        ErrorCode::WriterClosed,
        ErrorCode::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::FileAlreadyExists => "FILE_ALREADY_EXISTS",
            ErrorCode::NotAFile => "NOT_A_FILE",
            ErrorCode::NotADirectory => "NOT_A_DIRECTORY",
            ErrorCode::DirectoryNotEmpty => "DIRECTORY_NOT_EMPTY",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::DownloadCancelled => "DOWNLOAD_CANCELLED",
            ErrorCode::ReaderClosed => "READER_CLOSED",
            ErrorCode::WriterClosed => "WRITER_CLOSED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Split a registry message of the form `"[CODE] text"` into its parts.
    ///
    /// Messages without a well-formed prefix, or with a code outside the known
    /// set, map to [`ErrorCode::Unknown`]. A message that is only a prefix
    /// yields an empty text.
    pub fn parse_message(message: &str) -> (ErrorCode, String) {
        let Some(rest) = message.strip_prefix('[') else {
            return (ErrorCode::Unknown, message.to_string());
        };
        let Some(end) = rest.find(']') else {
            return (ErrorCode::Unknown, message.to_string());
        };

        let tag = &rest[..end];
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            return (ErrorCode::Unknown, message.to_string());
        }

        let text = rest[end + 1..].trim_start().to_string();
        (tag.parse().unwrap_or(ErrorCode::Unknown), text)
    }
}

impl FromStr for ErrorCode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| BridgeError::OperationFailed(format!("unknown error code: {}", s)))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_message_roundtrips_through_parse() {
        let err = BridgeError::coded(ErrorCode::ReaderClosed, "Reader handle not found: 7");
        assert_eq!(err.to_string(), "[READER_CLOSED] Reader handle not found: 7");

        let (code, text) = ErrorCode::parse_message(&err.to_string());
        assert_eq!(code, ErrorCode::ReaderClosed);
        assert_eq!(text, "Reader handle not found: 7");
    }

    #[test]
    fn test_parse_message_without_prefix() {
        let (code, text) = ErrorCode::parse_message("socket closed");
        assert_eq!(code, ErrorCode::Unknown);
        assert_eq!(text, "socket closed");
    }

    #[test]
    fn test_parse_message_unknown_code() {
        let (code, text) = ErrorCode::parse_message("[SOMETHING_ELSE] boom");
        assert_eq!(code, ErrorCode::Unknown);
        assert_eq!(text, "boom");
    }

    #[test]
    fn test_parse_message_malformed_prefix() {
        let (code, text) = ErrorCode::parse_message("[lower] nope");
        assert_eq!(code, ErrorCode::Unknown);
        assert_eq!(text, "[lower] nope");

        let (code, _) = ErrorCode::parse_message("[UNTERMINATED nope");
        assert_eq!(code, ErrorCode::Unknown);
    }

    #[test]
    fn test_parse_message_bare_code_has_empty_text() {
        let (code, text) = ErrorCode::parse_message("[IO_ERROR]");
        assert_eq!(code, ErrorCode::IoError);
        assert_eq!(text, "");

        let (code, text) = ErrorCode::parse_message("[DOWNLOAD_FAILED]   ");
        assert_eq!(code, ErrorCode::DownloadFailed);
        assert_eq!(text, "");
    }

    #[test]
    fn test_unsupported_message() {
        let err = BridgeError::Unsupported("flush");
        assert_eq!(err.to_string(), "flush is not supported by this handle registry");
    }
}
