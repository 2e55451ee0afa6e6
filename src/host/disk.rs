//! [`StorageHost`] backed by the real filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::Result;

use super::memory::build_matchers;
use super::{DirEntry, FileType, StorageHost};

/// Storage host operating on the local disk through `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskHost;

impl DiskHost {
    pub fn new() -> Self {
        DiskHost
    }

    /// Checks if paths are on the same filesystem, so a move can use an
    /// atomic `rename()` instead of copy+delete.
    fn is_same_filesystem(path1: &Path, path2: &Path) -> Result<bool> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta1 = fs::metadata(path1)?;
            let meta2_parent = path2.parent().unwrap_or(path2);
            let meta2 = fs::metadata(meta2_parent)?;
            Ok(meta1.dev() == meta2.dev())
        }

        #[cfg(not(unix))]
        {
            let path1_str = path1.to_string_lossy();
            let path2_str = path2.to_string_lossy();

            if path1_str.len() >= 2 && path2_str.len() >= 2 {
                Ok(path1_str.chars().next() == path2_str.chars().next())
            } else {
                Ok(true)
            }
        }
    }

    /// Recursively copies a directory tree.
    fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
        fs::create_dir_all(to)?;

        for entry in fs::read_dir(from)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let from_path = entry.path();
            let to_path = to.join(entry.file_name());

            if file_type.is_dir() {
                Self::copy_dir_recursive(&from_path, &to_path)?;
            } else {
                fs::copy(&from_path, &to_path)?;
            }
        }

        Ok(())
    }
}

impl StorageHost for DiskHost {
    fn is_case_sensitive(&self) -> bool {
        // HFS+/APFS and NTFS default to case-insensitive lookups
        !cfg!(any(windows, target_os = "macos"))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn read_dir(&self, dir_path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir_path)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                FileType::Dir
            } else {
                FileType::File
            };
            entries.push(DirEntry {
                path: entry.path(),
                kind,
            });
        }
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(fs::write(path, text)?)
    }

    fn mkdir(&self, dir_path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(dir_path)?)
    }

    fn move_path(&self, src: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if Self::is_same_filesystem(src, dest)? {
            fs::rename(src, dest)?;
        } else if fs::symlink_metadata(src)?.is_dir() {
            Self::copy_dir_recursive(src, dest)?;
            fs::remove_dir_all(src)?;
        } else {
            fs::copy(src, dest)?;
            fs::remove_file(src)?;
        }
        Ok(())
    }

    fn copy_path(&self, src: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::symlink_metadata(src)?.is_dir() {
            Self::copy_dir_recursive(src, dest)?;
        } else {
            fs::copy(src, dest)?;
        }
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn realpath(&self, path: &Path) -> Result<PathBuf> {
        Ok(fs::canonicalize(path)?)
    }

    fn current_directory(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
    }

    fn glob(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let (include, exclude) = build_matchers(patterns)?;
        let root = self.current_directory();

        let mut matches = Vec::new();
        let walker = WalkBuilder::new(&root)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();
        for entry in walker {
            let entry = entry.map_err(anyhow::Error::from)?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let candidate = entry.path().to_string_lossy().replace('\\', "/");
            let candidate = candidate.trim_start_matches('/');
            if include.is_match(candidate) && !exclude.is_match(candidate) {
                matches.push(entry.into_path());
            }
        }
        Ok(matches)
    }
}
