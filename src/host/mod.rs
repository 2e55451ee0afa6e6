//! Raw storage primitives the transactional layer sits on top of.
//!
//! A [`StorageHost`] operates directly on real or simulated storage with no
//! knowledge of queued operations. Implementations must signal a missing
//! path with an error for which [`StageError::is_not_found`] returns true;
//! all other failures propagate opaquely.
//!
//! [`StageError::is_not_found`]: crate::StageError::is_not_found

use std::path::{Path, PathBuf};

use crate::error::Result;

pub mod disk;
pub mod failing;
pub mod memory;

pub use disk::DiskHost;
pub use failing::FailingHost;
pub use memory::InMemoryHost;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

/// One entry returned by [`StorageHost::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: FileType,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.kind == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Dir
    }
}

/// Raw sync storage primitives.
///
/// The transactional layer never interprets file contents and treats glob
/// matching as a black box behind [`glob`](Self::glob).
pub trait StorageHost: Send + Sync {
    /// Whether paths differing only in casing address distinct entries.
    fn is_case_sensitive(&self) -> bool;

    /// Deletes a file, or a directory recursively.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Lists the direct children of a directory.
    fn read_dir(&self, dir_path: &Path) -> Result<Vec<DirEntry>>;

    /// Reads a file as UTF-8 text.
    fn read_file(&self, path: &Path) -> Result<String>;

    /// Writes a file, creating parent directories as needed.
    fn write_file(&self, path: &Path, text: &str) -> Result<()>;

    /// Creates a directory and its ancestors. Succeeds if already present.
    fn mkdir(&self, dir_path: &Path) -> Result<()>;

    /// Moves a file or directory, vacating the source.
    fn move_path(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Copies a file or directory recursively.
    fn copy_path(&self, src: &Path, dest: &Path) -> Result<()>;

    fn file_exists(&self, path: &Path) -> bool;

    fn directory_exists(&self, path: &Path) -> bool;

    /// Resolves symlinks and casing to the storage's own canonical path.
    fn realpath(&self, path: &Path) -> Result<PathBuf>;

    fn current_directory(&self) -> PathBuf;

    /// Returns every file path matching `patterns`.
    ///
    /// Patterns prefixed with `!` exclude matches.
    fn glob(&self, patterns: &[String]) -> Result<Vec<PathBuf>>;
}
