//! Error types for stagefs.
//!
//! All operations return `Result<T>` which aliases `Result<T, StageError>`.

use std::io;
use thiserror::Error;

/// Errors from staging, committing, and reading through the layer.
#[derive(Debug, Error)]
pub enum StageError {
    /// File not found on the storage host.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Directory not found on the storage host.
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    /// Path not found on the storage host (kind unknown).
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// An immediate operation or partial save would invalidate queued
    /// operations rooted elsewhere in the tree.
    ///
    /// `conflicts` enumerates every offending operation's kind and endpoints.
    #[error("Cannot {action}: the operation would conflict with queued operations ({conflicts})")]
    Conflict {
        action: &'static str,
        conflicts: String,
    },

    /// A read hit a path covered by a queued or unreconciled deletion.
    ///
    /// Distinct from a not-found error: the host may still hold the old
    /// contents, but they must not be trusted until a flush reconciles them.
    #[error("Cannot read '{0}': a queued or unflushed deletion covers this path")]
    StaleRead(String),

    /// Input path could not be standardized.
    #[error("Invalid path '{0}': {1}")]
    InvalidPath(String, String),

    /// File system operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Unexpected error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// True if this error signals an absent path.
    ///
    /// Deletion during flush is idempotent and swallows exactly this case.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileNotFound(_) | Self::DirectoryNotFound(_) | Self::PathNotFound(_) => true,
            Self::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias for stagefs operations.
pub type Result<T> = std::result::Result<T, StageError>;
