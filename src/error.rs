//! Error types for dirsort.
//!
//! Run-level problems (bad configuration, a second concurrent run) abort a run.
//! Per-file problems are captured as [`FileError`] records in the run report and
//! never stop the remaining files from being processed.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for dirsort operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Errors that can occur while planning, executing, or undoing a run.
#[derive(Error, Debug)]
pub enum OrganizeError {
    /// Invalid or missing source or target folder, or an unusable config file.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A protected system folder or an OS permission denial.
    #[error("Permission denied for {path}: {reason}")]
    Permission { path: PathBuf, reason: String },

    /// No free file name could be found for a colliding destination.
    #[error("No free name for {path} after {attempts} attempts")]
    CollisionExhausted { path: PathBuf, attempts: usize },

    /// A filesystem operation failed part way.
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was stopped on request.
    ///
    /// Cancelled runs still return a report with `RunState::Cancelled`;
    /// `RunReport::completed` converts one into this error.
    #[error("Run cancelled")]
    Cancelled,

    /// Another run is active on the same organizer.
    #[error("An organization run is already in progress")]
    RunInProgress,

    /// The run history file could not be read or written.
    #[error("History file error: {0}")]
    History(String),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

impl OrganizeError {
    /// Wraps an I/O error, classifying OS permission denials as [`OrganizeError::Permission`].
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::Permission {
                path: path.to_path_buf(),
                reason: source.to_string(),
            }
        } else {
            Self::Io {
                action,
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Refusal for a file inside a protected system folder.
    pub fn protected(path: &Path) -> Self {
        Self::Permission {
            path: path.to_path_buf(),
            reason: "file is inside a protected system folder".to_string(),
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::CollisionExhausted { .. } => ErrorKind::CollisionExhausted,
            Self::Io { .. } | Self::History(_) | Self::WorkerPanicked => ErrorKind::IoFailure,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::RunInProgress => ErrorKind::RunInProgress,
        }
    }
}

/// Coarse classification of an [`OrganizeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    Permission,
    CollisionExhausted,
    IoFailure,
    Cancelled,
    RunInProgress,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Permission => "permission",
            Self::CollisionExhausted => "collision",
            Self::IoFailure => "io",
            Self::Cancelled => "cancelled",
            Self::RunInProgress => "busy",
        };
        f.write_str(name)
    }
}

/// A per-file failure recorded in a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// The source file the failure applies to.
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: &Path, error: &OrganizeError) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.path.display(), self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_io_error_is_permission() {
        let err = OrganizeError::io(
            "move",
            Path::new("/locked/file.txt"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn test_other_io_error_is_io_failure() {
        let err = OrganizeError::io(
            "copy",
            Path::new("/full/disk.bin"),
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(err.to_string().contains("Failed to copy"));
    }

    #[test]
    fn test_file_error_captures_kind_and_message() {
        let err = OrganizeError::CollisionExhausted {
            path: PathBuf::from("/target/Documents/a.txt"),
            attempts: 1000,
        };
        let record = FileError::new(Path::new("/src/a.txt"), &err);
        assert_eq!(record.kind, ErrorKind::CollisionExhausted);
        assert_eq!(record.path, PathBuf::from("/src/a.txt"));
        assert!(record.message.contains("1000"));
    }
}
