//! The transactional facade over a storage host.
//!
//! Mutations queue in an in-memory tree and only reach the host on an
//! explicit commit point ([`flush`](TransactionalFileSystem::flush) or
//! [`save_for_directory`](TransactionalFileSystem::save_for_directory)),
//! while reads reflect the staged state. Immediate operations bypass the
//! queue after proving no queued operation elsewhere would be invalidated.
//!
//! ## Execution guarantees
//!
//! - **Ordering**: queued operations execute in one global sequence,
//!   merged across every directory's queue
//! - **Conflict detection**: immediate operations and partial saves fail
//!   fast, before any host I/O, if a queued operation depends on the paths
//!   they touch
//! - **Weak flush consistency**: the queue is drained before execution
//!   begins; if an operation fails mid-flush, later operations are never
//!   attempted and already-applied ones are not rolled back
//!
//! One logical caller per instance: all tree mutations complete
//! synchronously inside the call that triggered them, and the design
//! provides no internal locking.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, StageError};
use crate::host::{DirEntry, FileType, StorageHost};
use crate::ops::{FileSystemOperation, QueuedOperation};
use crate::path::{self, PathCasingMaintainer, StandardizedPath};
use crate::tree::DirectoryRegistry;

/// Coordinates the staged directory tree, the storage host, and path
/// casing.
///
/// All state is instance-scoped: independent instances never interfere.
pub struct TransactionalFileSystem {
    host: Arc<dyn StorageHost>,
    directories: DirectoryRegistry,
    casing: PathCasingMaintainer,
    next_sequence: u64,
}

impl TransactionalFileSystem {
    pub fn new(host: Arc<dyn StorageHost>) -> Self {
        let casing = PathCasingMaintainer::new(host.is_case_sensitive());
        TransactionalFileSystem {
            host,
            directories: DirectoryRegistry::default(),
            casing,
            next_sequence: 0,
        }
    }

    /// The underlying storage host, for direct unmediated access.
    pub fn host(&self) -> &Arc<dyn StorageHost> {
        &self.host
    }

    fn bump_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    // --- Path standardization ---

    /// Normalizes `raw` into an absolute, forward-slash, case-reconciled
    /// path. Relative input resolves against `relative_base`, or the host's
    /// current directory when absent.
    pub fn standardize_path(
        &mut self,
        raw: &str,
        relative_base: Option<&StandardizedPath>,
    ) -> Result<StandardizedPath> {
        let cwd;
        let base = match relative_base {
            Some(base) => base.as_str(),
            None => {
                cwd = self
                    .host
                    .current_directory()
                    .to_string_lossy()
                    .replace('\\', "/");
                &cwd
            }
        };
        let standardized = path::standardize(raw, base)?;
        Ok(self.casing.get_path(standardized))
    }

    fn standardize_host_path(&mut self, host_path: &Path) -> Result<StandardizedPath> {
        let text = host_path.to_string_lossy().replace('\\', "/");
        let standardized = path::standardize(&text, "/")?;
        Ok(self.casing.get_path(standardized))
    }

    // --- Queuing ---

    /// Queues a file for deletion. Takes effect in the staged view
    /// immediately; the host is untouched until a flush.
    pub fn queue_file_delete(&mut self, file_path: &StandardizedPath) {
        log::debug!("Queuing delete of file: {file_path}");
        let parent = self.directories.get_or_create_parent(file_path);
        let op = QueuedOperation {
            sequence: self.bump_sequence(),
            operation: FileSystemOperation::DeleteFile {
                path: file_path.clone(),
            },
        };
        self.directories.push_operation(&parent, op);
        self.casing.remove_path(file_path);
    }

    /// Removes a previously queued delete for exactly `file_path`, leaving
    /// any queued delete of its parent directory in place. No host call
    /// occurs.
    pub fn remove_file_delete(&mut self, file_path: &StandardizedPath) {
        log::debug!("Removing queued delete of file: {file_path}");
        self.directories.dequeue_file_delete(file_path);
    }

    /// Queues a directory (and its whole subtree) for deletion.
    pub fn queue_directory_delete(&mut self, dir_path: &StandardizedPath) {
        log::debug!("Queuing delete of directory: {dir_path}");
        self.directories.get_or_create(dir_path);
        self.directories.set_is_deleted(dir_path, true);
        let parent = self.directories.get_or_create_parent(dir_path);
        let op = QueuedOperation {
            sequence: self.bump_sequence(),
            operation: FileSystemOperation::DeleteDir {
                dir: dir_path.clone(),
            },
        };
        self.directories.push_operation(&parent, op);
        self.casing.remove_path(dir_path);
    }

    /// Queues creation of a directory. Creating a path implies its
    /// ancestors exist, so any queued-deleted ancestors come back.
    pub fn queue_mkdir(&mut self, dir_path: &StandardizedPath) {
        log::debug!("Queuing mkdir: {dir_path}");
        self.directories.get_or_create(dir_path);
        self.directories.set_is_deleted(dir_path, false);
        let parent = self.directories.get_or_create_parent(dir_path);
        let op = QueuedOperation {
            sequence: self.bump_sequence(),
            operation: FileSystemOperation::Mkdir {
                dir: dir_path.clone(),
            },
        };
        self.directories.push_operation(&parent, op);
    }

    /// Queues a directory move. The source is vacated in the staged view;
    /// the destination exists in it.
    pub fn queue_move_directory(&mut self, src: &StandardizedPath, dest: &StandardizedPath) {
        log::debug!("Queuing move: {src} to {dest}");
        self.queue_transfer(src, dest, true);
    }

    /// Queues a directory copy. Unlike a move, the source stays put.
    pub fn queue_copy_directory(&mut self, src: &StandardizedPath, dest: &StandardizedPath) {
        log::debug!("Queuing copy: {src} to {dest}");
        self.queue_transfer(src, dest, false);
    }

    fn queue_transfer(&mut self, src: &StandardizedPath, dest: &StandardizedPath, is_move: bool) {
        self.directories.get_or_create(src);
        self.directories.get_or_create(dest);
        self.directories.set_is_deleted(dest, false);

        let operation = if is_move {
            FileSystemOperation::Move {
                old_dir: src.clone(),
                new_dir: dest.clone(),
            }
        } else {
            FileSystemOperation::Copy {
                old_dir: src.clone(),
                new_dir: dest.clone(),
            }
        };
        let op = QueuedOperation {
            sequence: self.bump_sequence(),
            operation,
        };

        let src_parent = self.directories.get_or_create_parent(src);
        self.directories.push_operation(&src_parent, op.clone());
        // conflict checks see the operation "landing" at the destination
        let inbound_owner = dest.parent().unwrap_or_else(|| dest.clone());
        self.directories.push_inbound(&inbound_owner, op);

        if is_move {
            self.directories.set_is_deleted(src, true);
            self.casing.remove_path(src);
        }
    }

    // --- Committing ---

    /// Executes every queued operation against the host in global sequence
    /// order and clears the whole staged tree.
    ///
    /// The queue is drained before execution begins: if an operation fails,
    /// later operations are never attempted, already-applied ones stay
    /// applied, and the error propagates. Deletes of already-absent paths
    /// succeed.
    pub fn flush(&mut self) -> Result<()> {
        let operations = self.directories.take_all_operations();
        log::debug!("Flushing {} queued operations", operations.len());
        for op in &operations {
            self.execute_operation(op)?;
        }
        Ok(())
    }

    /// Scoped flush: commits the operations inside `dir_path`'s subtree,
    /// plus any ancestor mkdirs that exist solely to materialize the path,
    /// leaving the rest of the queue untouched.
    ///
    /// Fails with a conflict error, before any host I/O, if a queued
    /// operation outside the subtree would be invalidated.
    pub fn save_for_directory(&mut self, dir_path: &StandardizedPath) -> Result<()> {
        self.directories.get_or_create(dir_path);
        self.ensure_no_external_operations(dir_path, "save directory")?;

        let operations = self.directories.take_subtree_operations(dir_path);
        log::debug!(
            "Saving directory {dir_path} ({} scoped operations)",
            operations.len()
        );
        if !self.host.directory_exists(dir_path.as_ref()) {
            self.host.mkdir(dir_path.as_ref())?;
        }
        for op in &operations {
            self.execute_operation(op)?;
        }
        Ok(())
    }

    fn execute_operation(&self, op: &QueuedOperation) -> Result<()> {
        match &op.operation {
            FileSystemOperation::DeleteFile { path } => {
                self.delete_suppress_not_found(path)?;
                log::debug!("Deleted file: {path}");
            }
            FileSystemOperation::DeleteDir { dir } => {
                self.delete_suppress_not_found(dir)?;
                log::debug!("Deleted directory: {dir}");
            }
            FileSystemOperation::Mkdir { dir } => {
                self.host.mkdir(dir.as_ref())?;
                log::debug!("Created directory: {dir}");
            }
            FileSystemOperation::Move { old_dir, new_dir } => {
                self.host.move_path(old_dir.as_ref(), new_dir.as_ref())?;
                log::info!("Moved: {old_dir} to {new_dir}");
            }
            FileSystemOperation::Copy { old_dir, new_dir } => {
                self.host.copy_path(old_dir.as_ref(), new_dir.as_ref())?;
                log::info!("Copied: {old_dir} to {new_dir}");
            }
        }
        Ok(())
    }

    fn delete_suppress_not_found(&self, path: &StandardizedPath) -> Result<()> {
        match self.host.delete(path.as_ref()) {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }

    fn ensure_no_external_operations(
        &self,
        dir_path: &StandardizedPath,
        action: &'static str,
    ) -> Result<()> {
        let conflicts = self.directories.external_operations(dir_path);
        if conflicts.is_empty() {
            return Ok(());
        }
        let conflicts = conflicts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(StageError::Conflict { action, conflicts })
    }

    // --- Immediate operations ---

    /// Writes a file through to the host after dequeuing any pending delete
    /// of the same file.
    pub fn write_file(&mut self, file_path: &StandardizedPath, text: &str) -> Result<()> {
        let parent = self.directories.get_or_create_parent(file_path);
        self.ensure_no_external_operations(&parent, "write file")?;
        self.directories.dequeue_file_delete(file_path);
        log::debug!("Writing file: {file_path}");
        self.host.write_file(file_path.as_ref(), text)
    }

    /// Deletes a file on the host right now.
    ///
    /// On a host failure the delete is re-queued for the next flush and the
    /// original error propagates.
    pub fn delete_file_immediately(&mut self, file_path: &StandardizedPath) -> Result<()> {
        let parent = self.directories.get_or_create_parent(file_path);
        self.ensure_no_external_operations(&parent, "delete file")?;
        self.directories.dequeue_file_delete(file_path);
        self.casing.remove_path(file_path);

        match self.host.delete(file_path.as_ref()) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("Immediate delete of {file_path} failed; queuing retry");
                self.queue_file_delete(file_path);
                Err(err)
            }
        }
    }

    /// Moves a file on the host right now by deleting the source and
    /// writing `text` at the destination.
    pub fn move_file_immediately(
        &mut self,
        old_file_path: &StandardizedPath,
        new_file_path: &StandardizedPath,
        text: &str,
    ) -> Result<()> {
        let old_parent = self.directories.get_or_create_parent(old_file_path);
        self.ensure_no_external_operations(&old_parent, "move file")?;
        let new_parent = self.directories.get_or_create_parent(new_file_path);
        self.ensure_no_external_operations(&new_parent, "move file")?;

        self.delete_file_immediately(old_file_path)?;
        self.write_file(new_file_path, text)
    }

    /// Deletes a directory on the host right now.
    ///
    /// On a host failure the staged subtree is restored, a delete is
    /// re-queued so a later flush can retry, and the original error
    /// propagates. Until that flush, the staged view keeps reporting the
    /// directory as present, matching the host.
    pub fn delete_directory_immediately(&mut self, dir_path: &StandardizedPath) -> Result<()> {
        self.directories.get_or_create(dir_path);
        self.ensure_no_external_operations(dir_path, "delete directory")?;

        let removed = self.directories.remove_subtree(dir_path);
        self.directories.dequeue_dir_delete(dir_path);
        self.casing.remove_path(dir_path);

        match self.host.delete(dir_path.as_ref()) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("Immediate delete of {dir_path} failed; restoring state and queuing retry");
                self.directories.restore_subtree(removed);
                self.requeue_directory_delete(dir_path);
                Err(err)
            }
        }
    }

    /// Empties a directory on the host right now by deleting it and
    /// recreating it empty. Clearing a directory that does not exist yet
    /// just creates it.
    pub fn clear_directory_immediately(&mut self, dir_path: &StandardizedPath) -> Result<()> {
        self.directories.get_or_create(dir_path);
        self.ensure_no_external_operations(dir_path, "clear directory")?;

        let removed = self.directories.remove_subtree(dir_path);
        self.directories.dequeue_dir_delete(dir_path);
        self.casing.remove_path(dir_path);

        let result = self
            .delete_suppress_not_found(dir_path)
            .and_then(|()| self.host.mkdir(dir_path.as_ref()));
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("Immediate clear of {dir_path} failed; restoring state and queuing retry");
                self.directories.restore_subtree(removed);
                self.requeue_directory_delete(dir_path);
                Err(err)
            }
        }
    }

    /// Re-queues a directory delete after a failed immediate attempt. The
    /// node is deliberately left not-deleted: the host still holds the
    /// directory, and the staged view must agree until the retry runs.
    fn requeue_directory_delete(&mut self, dir_path: &StandardizedPath) {
        let parent = self.directories.get_or_create_parent(dir_path);
        let op = QueuedOperation {
            sequence: self.bump_sequence(),
            operation: FileSystemOperation::DeleteDir {
                dir: dir_path.clone(),
            },
        };
        self.directories.push_operation(&parent, op);
    }

    /// Moves a directory on the host right now. On success the affected
    /// staged subtrees leave the registry and the vacated source's casing
    /// is forgotten.
    pub fn move_directory_immediately(
        &mut self,
        src: &StandardizedPath,
        dest: &StandardizedPath,
    ) -> Result<()> {
        self.transfer_immediately(src, dest, true)
    }

    /// Copies a directory on the host right now.
    pub fn copy_directory_immediately(
        &mut self,
        src: &StandardizedPath,
        dest: &StandardizedPath,
    ) -> Result<()> {
        self.transfer_immediately(src, dest, false)
    }

    fn transfer_immediately(
        &mut self,
        src: &StandardizedPath,
        dest: &StandardizedPath,
        is_move: bool,
    ) -> Result<()> {
        let action = if is_move {
            "move directory"
        } else {
            "copy directory"
        };
        self.directories.get_or_create(src);
        self.directories.get_or_create(dest);
        self.ensure_no_external_operations(src, action)?;
        self.ensure_no_external_operations(dest, action)?;

        if is_move {
            self.host.move_path(src.as_ref(), dest.as_ref())?;
            log::info!("Moved: {src} to {dest}");
        } else {
            self.host.copy_path(src.as_ref(), dest.as_ref())?;
            log::info!("Copied: {src} to {dest}");
        }

        self.directories.remove_subtree(src);
        self.directories.remove_subtree(dest);
        if is_move {
            self.casing.remove_path(src);
        }
        Ok(())
    }

    // --- Queue-aware reads ---

    fn path_deleted_in_memory(&self, path: &StandardizedPath) -> bool {
        self.directories.is_deleted_at(path) || self.directories.is_file_queued_for_delete(path)
    }

    /// Whether the file exists in the staged view.
    ///
    /// False while the path (or an ancestor) is queued for deletion or
    /// mid-move, and false without consulting the host while an unflushed
    /// deletion makes cached knowledge below this point untrustworthy.
    pub fn file_exists(&self, file_path: &StandardizedPath) -> bool {
        if self.path_deleted_in_memory(file_path) {
            return false;
        }
        if self.directories.was_ever_deleted_at(file_path) {
            return false;
        }
        self.host.file_exists(file_path.as_ref())
    }

    /// Whether the directory exists in the staged view. A tracked,
    /// not-deleted node (a queued mkdir, a move destination) counts as
    /// existing before any flush.
    pub fn directory_exists(&self, dir_path: &StandardizedPath) -> bool {
        if let Some(node) = self.directories.get(dir_path)
            && !node.is_deleted
        {
            return true;
        }
        if self.path_deleted_in_memory(dir_path) {
            return false;
        }
        if self.directories.was_ever_deleted_at(dir_path) {
            return false;
        }
        self.host.directory_exists(dir_path.as_ref())
    }

    /// Reads a file, or fails with a stale-read error when the path lies
    /// under a queued or unreconciled deletion.
    pub fn read_file(&self, file_path: &StandardizedPath) -> Result<String> {
        if self.path_deleted_in_memory(file_path)
            || self.directories.was_ever_deleted_at(file_path)
        {
            return Err(StageError::StaleRead(file_path.as_str().to_string()));
        }
        match self.host.read_file(file_path.as_ref()) {
            Err(err) if err.is_not_found() => {
                Err(StageError::FileNotFound(file_path.as_str().to_string()))
            }
            other => other,
        }
    }

    /// Lists a directory in the staged view: host entries minus anything
    /// queued for deletion, plus tracked child directories the host does
    /// not know about yet.
    pub fn read_dir(&mut self, dir_path: &StandardizedPath) -> Result<Vec<DirEntry>> {
        if self.directories.is_deleted_at(dir_path)
            || self.directories.was_ever_deleted_at(dir_path)
        {
            return Err(StageError::StaleRead(dir_path.as_str().to_string()));
        }

        let staged_exists = self
            .directories
            .get(dir_path)
            .is_some_and(|node| !node.is_deleted);
        let host_entries = match self.host.read_dir(dir_path.as_ref()) {
            Ok(entries) => entries,
            Err(err) if err.is_not_found() && staged_exists => Vec::new(),
            Err(err) if err.is_not_found() => {
                return Err(StageError::DirectoryNotFound(dir_path.as_str().to_string()));
            }
            Err(err) => return Err(err),
        };

        let mut entries = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for entry in host_entries {
            let standardized = self.standardize_host_path(&entry.path)?;
            if self.path_deleted_in_memory(&standardized) {
                continue;
            }
            seen.insert(standardized.clone());
            entries.push(DirEntry {
                path: standardized.as_str().into(),
                kind: entry.kind,
            });
        }
        for child in self.directories.live_children(dir_path) {
            if seen.insert(child.clone()) {
                entries.push(DirEntry {
                    path: child.as_str().into(),
                    kind: FileType::Dir,
                });
            }
        }
        Ok(entries)
    }

    /// Subdirectories of `dir_path` in the staged view.
    pub fn get_directories(&mut self, dir_path: &StandardizedPath) -> Result<Vec<StandardizedPath>> {
        let mut dirs = Vec::new();
        for entry in self.read_dir(dir_path)? {
            if entry.is_dir() {
                dirs.push(self.standardize_host_path(&entry.path)?);
            }
        }
        Ok(dirs)
    }

    /// Matches `patterns` through the host's matcher, dropping results
    /// queued for deletion.
    pub fn glob(&mut self, patterns: &[String]) -> Result<Vec<StandardizedPath>> {
        let matches = self.host.glob(patterns)?;
        let mut kept = Vec::with_capacity(matches.len());
        for host_path in matches {
            let standardized = self.standardize_host_path(&host_path)?;
            if !self.path_deleted_in_memory(&standardized) {
                kept.push(standardized);
            }
        }
        Ok(kept)
    }
}
