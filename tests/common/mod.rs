//! Shared helpers for integration tests.
//!
//! Every test here runs against a real temporary directory through
//! [`DiskHost`], exercising the same code paths a production caller hits.

use std::sync::Arc;

use stagefs::TransactionalFileSystem;
use stagefs::host::DiskHost;
use stagefs::path::StandardizedPath;
use tempfile::TempDir;

/// A transactional layer over the real disk, rooted in a fresh temp dir.
#[allow(unused)]
pub fn disk_fs() -> (TempDir, TransactionalFileSystem) {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp = TempDir::new().unwrap();
    let fs = TransactionalFileSystem::new(Arc::new(DiskHost::new()));
    (temp, fs)
}

/// Standardizes a path relative to the temp dir.
#[allow(unused)]
pub fn std_path(
    fs: &mut TransactionalFileSystem,
    temp: &TempDir,
    relative: &str,
) -> StandardizedPath {
    let raw = temp.path().join(relative);
    fs.standardize_path(&raw.to_string_lossy(), None).unwrap()
}
