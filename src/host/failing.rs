//! Fault-injecting [`StorageHost`] decorator for tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, StageError};

use super::{DirEntry, StorageHost};

/// Wraps a host and fails a configured operation, delegating everything else.
///
/// Used to exercise the restore-and-requeue path of immediate deletes and
/// mid-flush failure behavior.
pub struct FailingHost<H> {
    inner: H,
    failing_op: Mutex<Option<&'static str>>,
    call_counts: Mutex<std::collections::HashMap<&'static str, AtomicU64>>,
}

impl<H: StorageHost> FailingHost<H> {
    /// Wraps `inner` without any configured failure.
    pub fn new(inner: H) -> Self {
        FailingHost {
            inner,
            failing_op: Mutex::new(None),
            call_counts: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Makes every call to `op` fail until reconfigured.
    ///
    /// Operation names match the [`StorageHost`] method names.
    pub fn fail_on(&self, op: &'static str) {
        *self.failing_op.lock().unwrap() = Some(op);
    }

    /// Clears the configured failure.
    pub fn succeed(&self) {
        *self.failing_op.lock().unwrap() = None;
    }

    /// Number of times `op` was called, failed calls included.
    pub fn call_count(&self, op: &str) -> u64 {
        self.call_counts
            .lock()
            .unwrap()
            .get(op)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn check_fault(&self, op: &'static str) -> Result<()> {
        self.call_counts
            .lock()
            .unwrap()
            .entry(op)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst);

        if *self.failing_op.lock().unwrap() == Some(op) {
            Err(StageError::Io(io::Error::other(format!(
                "injected failure in {op}"
            ))))
        } else {
            Ok(())
        }
    }
}

impl<H: StorageHost> StorageHost for FailingHost<H> {
    fn is_case_sensitive(&self) -> bool {
        self.inner.is_case_sensitive()
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.check_fault("delete")?;
        self.inner.delete(path)
    }

    fn read_dir(&self, dir_path: &Path) -> Result<Vec<DirEntry>> {
        self.check_fault("read_dir")?;
        self.inner.read_dir(dir_path)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        self.check_fault("read_file")?;
        self.inner.read_file(path)
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<()> {
        self.check_fault("write_file")?;
        self.inner.write_file(path, text)
    }

    fn mkdir(&self, dir_path: &Path) -> Result<()> {
        self.check_fault("mkdir")?;
        self.inner.mkdir(dir_path)
    }

    fn move_path(&self, src: &Path, dest: &Path) -> Result<()> {
        self.check_fault("move_path")?;
        self.inner.move_path(src, dest)
    }

    fn copy_path(&self, src: &Path, dest: &Path) -> Result<()> {
        self.check_fault("copy_path")?;
        self.inner.copy_path(src, dest)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.inner.file_exists(path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.inner.directory_exists(path)
    }

    fn realpath(&self, path: &Path) -> Result<PathBuf> {
        self.check_fault("realpath")?;
        self.inner.realpath(path)
    }

    fn current_directory(&self) -> PathBuf {
        self.inner.current_directory()
    }

    fn glob(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        self.check_fault("glob")?;
        self.inner.glob(patterns)
    }
}
