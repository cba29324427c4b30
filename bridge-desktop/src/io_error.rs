//! Mapping of `std::io` failures onto registry error codes.

use std::io;
use std::path::Path;

use bridge_traits::{BridgeError, ErrorCode};

pub(crate) fn code_for(err: &io::Error) -> ErrorCode {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorCode::FileNotFound,
        io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
        io::ErrorKind::AlreadyExists => ErrorCode::FileAlreadyExists,
        _ => ErrorCode::IoError,
    }
}

/// `"[CODE] <what>: <path> (<io error>)"`
pub(crate) fn path_error(err: &io::Error, what: &str, path: &Path) -> BridgeError {
    BridgeError::coded(
        code_for(err),
        format!("{}: {} ({})", what, path.display(), err),
    )
}

pub(crate) fn io_failure(err: &io::Error, what: &str) -> BridgeError {
    BridgeError::coded(code_for(err), format!("{}: {}", what, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_to_codes() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(code_for(&missing), ErrorCode::FileNotFound);

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        let err = path_error(&denied, "Cannot open file", Path::new("/root/x"));
        assert!(err.to_string().starts_with("[PERMISSION_DENIED] Cannot open file: /root/x"));

        let other = io::Error::new(io::ErrorKind::Other, "disk on fire");
        assert_eq!(
            io_failure(&other, "Write failed").to_string(),
            "[IO_ERROR] Write failed: disk on fire"
        );
    }
}
