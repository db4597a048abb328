//! Error types for media triage
//!
//! Only run-level failures live here. Problems with a single file are
//! recorded as [`Issue`](crate::models::Issue)s or audit log entries instead.

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur during a triage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// The scan root exists but is not a directory
    NotADirectory,
    /// I/O error during file operations
    IoError,
    /// The external probe tool is not installed
    ProbeUnavailable,
    /// The worker pool could not be created
    ThreadPool,
    /// Unknown error
    Unknown,
}

/// Represents an error that occurred during scanning
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::PermissionDenied,
            Some(path.clone()),
            format!("Permission denied: {:?}", path),
        )
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create a not-a-directory error
    pub fn not_a_directory(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::NotADirectory,
            Some(path.clone()),
            format!("{} is not a directory", path.display()),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Create a probe-unavailable error
    pub fn probe_unavailable(program: &str) -> Self {
        Self::new(
            ScanErrorKind::ProbeUnavailable,
            None,
            format!("{} not found. Install ffmpeg.", program),
        )
    }

    /// Create a worker pool error
    pub fn thread_pool(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::ThreadPool, None, message)
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ScanErrorKind::ProbeUnavailable
                | ScanErrorKind::ThreadPool
                | ScanErrorKind::NotFound
                | ScanErrorKind::NotADirectory
                | ScanErrorKind::PermissionDenied
        )
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let kind = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::PermissionDenied) => ScanErrorKind::PermissionDenied,
            Some(std::io::ErrorKind::NotFound) => ScanErrorKind::NotFound,
            Some(_) => ScanErrorKind::IoError,
            None => ScanErrorKind::Unknown,
        };
        Self::new(kind, path, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kind_mapping() {
        let err: ScanError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.kind, ScanErrorKind::PermissionDenied);

        let err: ScanError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind, ScanErrorKind::NotFound);

        let err: ScanError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.kind, ScanErrorKind::IoError);
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(ScanError::probe_unavailable("ffprobe").is_fatal());
        assert!(ScanError::not_a_directory(PathBuf::from("/x")).is_fatal());
        assert!(!ScanError::io_error(None, "transient").is_fatal());
    }

    #[test]
    fn test_probe_unavailable_message() {
        let err = ScanError::probe_unavailable("ffprobe");
        assert_eq!(err.kind, ScanErrorKind::ProbeUnavailable);
        assert!(err.message.contains("ffprobe not found"));
    }
}
