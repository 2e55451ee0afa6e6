//! Deferred filesystem operations and their global ordering.

use std::fmt;

use crate::path::StandardizedPath;

/// A mutating action recorded for deferred execution against real storage.
///
/// A closed set: execution and conflict detection both match exhaustively,
/// so adding a kind is a compile-time obligation to handle it everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSystemOperation {
    /// Delete a single file.
    DeleteFile { path: StandardizedPath },
    /// Delete a directory and everything under it.
    DeleteDir { dir: StandardizedPath },
    /// Create a directory (and implicitly its ancestors).
    Mkdir { dir: StandardizedPath },
    /// Move a directory, vacating the source.
    Move {
        old_dir: StandardizedPath,
        new_dir: StandardizedPath,
    },
    /// Copy a directory, leaving the source in place.
    Copy {
        old_dir: StandardizedPath,
        new_dir: StandardizedPath,
    },
}

/// A [`FileSystemOperation`] stamped with its position in the global order.
///
/// Sequence numbers come from one counter per
/// [`TransactionalFileSystem`](crate::TransactionalFileSystem) instance, so
/// flushing can merge every directory's queue into a single total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedOperation {
    pub sequence: u64,
    pub operation: FileSystemOperation,
}

impl QueuedOperation {
    /// True if both endpoints (for moves/copies) or the single target (for
    /// deletes/mkdirs) lie inside `dir`'s subtree.
    ///
    /// Purely internal operations never block an outer immediate operation
    /// on `dir` itself.
    pub fn is_internal_to(&self, dir: &StandardizedPath) -> bool {
        match &self.operation {
            FileSystemOperation::Move { old_dir, new_dir }
            | FileSystemOperation::Copy { old_dir, new_dir } => {
                old_dir.is_descendant_or_equal_of(dir) && new_dir.is_descendant_or_equal_of(dir)
            }
            FileSystemOperation::DeleteFile { path } => path.is_descendant_or_equal_of(dir),
            FileSystemOperation::DeleteDir { dir: target }
            | FileSystemOperation::Mkdir { dir: target } => target.is_descendant_or_equal_of(dir),
        }
    }

    /// True if acting on `dir` right now would run under one of this
    /// operation's endpoints.
    pub fn affects(&self, dir: &StandardizedPath) -> bool {
        match &self.operation {
            FileSystemOperation::Move { old_dir, new_dir }
            | FileSystemOperation::Copy { old_dir, new_dir } => {
                dir.is_descendant_or_equal_of(old_dir) || dir.is_descendant_or_equal_of(new_dir)
            }
            FileSystemOperation::DeleteDir { dir: target } => dir.is_descendant_or_equal_of(target),
            FileSystemOperation::DeleteFile { .. } | FileSystemOperation::Mkdir { .. } => false,
        }
    }
}

impl fmt::Display for QueuedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            FileSystemOperation::DeleteFile { path } => write!(f, "delete file {path}"),
            FileSystemOperation::DeleteDir { dir } => write!(f, "delete directory {dir}"),
            FileSystemOperation::Mkdir { dir } => write!(f, "create directory {dir}"),
            FileSystemOperation::Move { old_dir, new_dir } => {
                write!(f, "move {old_dir} to {new_dir}")
            }
            FileSystemOperation::Copy { old_dir, new_dir } => {
                write!(f, "copy {old_dir} to {new_dir}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::standardize;

    fn p(raw: &str) -> StandardizedPath {
        standardize(raw, "/").unwrap()
    }

    fn queued(sequence: u64, operation: FileSystemOperation) -> QueuedOperation {
        QueuedOperation {
            sequence,
            operation,
        }
    }

    #[test]
    fn move_inside_subtree_is_internal() {
        let op = queued(
            0,
            FileSystemOperation::Move {
                old_dir: p("/dir/subDir"),
                new_dir: p("/dir/newDir"),
            },
        );
        assert!(op.is_internal_to(&p("/dir")));
        assert!(!op.is_internal_to(&p("/dir/subDir")));
    }

    #[test]
    fn move_affects_both_endpoints() {
        let op = queued(
            0,
            FileSystemOperation::Move {
                old_dir: p("/dir"),
                new_dir: p("/dir2"),
            },
        );
        assert!(op.affects(&p("/dir")));
        assert!(op.affects(&p("/dir2")));
        assert!(op.affects(&p("/dir2/file.ts")));
        assert!(!op.affects(&p("/other")));
    }

    #[test]
    fn display_names_kind_and_endpoints() {
        let op = queued(
            3,
            FileSystemOperation::Copy {
                old_dir: p("/a"),
                new_dir: p("/b"),
            },
        );
        assert_eq!(op.to_string(), "copy /a to /b");
    }
}
