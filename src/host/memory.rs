//! Simulated storage backed by in-memory maps.
//!
//! Behaves like a real disk at the [`StorageHost`] boundary: paths are
//! forward-slash strings rooted at `/`, writes create parent directories,
//! deletes of directories are recursive, and missing paths yield the
//! distinguishable not-found errors. Case sensitivity is configurable so
//! casing reconciliation can be exercised without a matching real host.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{Result, StageError};

use super::{DirEntry, FileType, StorageHost};

#[derive(Default)]
struct State {
    /// Files keyed by lookup key, storing display casing and contents.
    files: BTreeMap<String, FileData>,
    /// Directories keyed by lookup key, storing display casing.
    dirs: BTreeMap<String, String>,
}

struct FileData {
    path: String,
    text: String,
}

/// An in-memory [`StorageHost`].
pub struct InMemoryHost {
    state: RwLock<State>,
    case_sensitive: bool,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    /// Creates an empty case-sensitive host containing only the root.
    pub fn new() -> Self {
        Self::with_case_sensitivity(true)
    }

    /// Creates an empty case-insensitive host containing only the root.
    pub fn new_case_insensitive() -> Self {
        Self::with_case_sensitivity(false)
    }

    fn with_case_sensitivity(case_sensitive: bool) -> Self {
        let host = InMemoryHost {
            state: RwLock::new(State::default()),
            case_sensitive,
        };
        host.state
            .write()
            .unwrap()
            .dirs
            .insert(host.key("/"), "/".to_string());
        host
    }

    fn display(path: &Path) -> String {
        let mut text = path.to_string_lossy().replace('\\', "/");
        if text.is_empty() {
            text.push('/');
        }
        while text.len() > 1 && text.ends_with('/') {
            text.pop();
        }
        text
    }

    fn key(&self, display: &str) -> String {
        if self.case_sensitive {
            display.to_string()
        } else {
            display.to_lowercase()
        }
    }

    fn parent_display(display: &str) -> Option<String> {
        if display == "/" {
            return None;
        }
        match display.rfind('/') {
            Some(0) => Some("/".to_string()),
            Some(idx) => Some(display[..idx].to_string()),
            None => None,
        }
    }

    fn create_dir_chain(&self, state: &mut State, display: &str) {
        let mut current = Some(display.to_string());
        while let Some(dir) = current {
            let key = self.key(&dir);
            if state.dirs.contains_key(&key) {
                break;
            }
            state.dirs.insert(key, dir.clone());
            current = Self::parent_display(&dir);
        }
    }

    fn dir_prefix_key(&self, display: &str) -> String {
        let key = self.key(display);
        if key == "/" { key } else { format!("{key}/") }
    }
}

impl StorageHost for InMemoryHost {
    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let display = Self::display(path);
        let key = self.key(&display);
        let mut state = self.state.write().unwrap();

        if state.files.remove(&key).is_some() {
            return Ok(());
        }
        if state.dirs.remove(&key).is_some() {
            let prefix = self.dir_prefix_key(&display);
            state.files.retain(|k, _| !k.starts_with(&prefix));
            state.dirs.retain(|k, _| !k.starts_with(&prefix));
            return Ok(());
        }
        Err(StageError::PathNotFound(display))
    }

    fn read_dir(&self, dir_path: &Path) -> Result<Vec<DirEntry>> {
        let display = Self::display(dir_path);
        let key = self.key(&display);
        let state = self.state.read().unwrap();

        let Some(dir_display) = state.dirs.get(&key) else {
            return Err(StageError::DirectoryNotFound(display));
        };

        let mut entries = Vec::new();
        for child in state.dirs.values() {
            if Self::parent_display(child).as_deref() == Some(dir_display.as_str()) {
                entries.push(DirEntry {
                    path: PathBuf::from(child),
                    kind: FileType::Dir,
                });
            }
        }
        for file in state.files.values() {
            if Self::parent_display(&file.path).as_deref() == Some(dir_display.as_str()) {
                entries.push(DirEntry {
                    path: PathBuf::from(&file.path),
                    kind: FileType::File,
                });
            }
        }
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        let display = Self::display(path);
        let state = self.state.read().unwrap();
        state
            .files
            .get(&self.key(&display))
            .map(|file| file.text.clone())
            .ok_or(StageError::FileNotFound(display))
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<()> {
        let display = Self::display(path);
        let mut state = self.state.write().unwrap();
        if let Some(parent) = Self::parent_display(&display) {
            self.create_dir_chain(&mut state, &parent);
        }
        state.files.insert(
            self.key(&display),
            FileData {
                path: display,
                text: text.to_string(),
            },
        );
        Ok(())
    }

    fn mkdir(&self, dir_path: &Path) -> Result<()> {
        let display = Self::display(dir_path);
        let mut state = self.state.write().unwrap();
        self.create_dir_chain(&mut state, &display);
        Ok(())
    }

    fn move_path(&self, src: &Path, dest: &Path) -> Result<()> {
        self.transfer(src, dest, true)
    }

    fn copy_path(&self, src: &Path, dest: &Path) -> Result<()> {
        self.transfer(src, dest, false)
    }

    fn file_exists(&self, path: &Path) -> bool {
        let key = self.key(&Self::display(path));
        self.state.read().unwrap().files.contains_key(&key)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        let key = self.key(&Self::display(path));
        self.state.read().unwrap().dirs.contains_key(&key)
    }

    fn realpath(&self, path: &Path) -> Result<PathBuf> {
        let display = Self::display(path);
        let key = self.key(&display);
        let state = self.state.read().unwrap();
        if let Some(file) = state.files.get(&key) {
            return Ok(PathBuf::from(&file.path));
        }
        if let Some(dir) = state.dirs.get(&key) {
            return Ok(PathBuf::from(dir));
        }
        Err(StageError::PathNotFound(display))
    }

    fn current_directory(&self) -> PathBuf {
        PathBuf::from("/")
    }

    fn glob(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let (include, exclude) = build_matchers(patterns)?;
        let state = self.state.read().unwrap();
        let mut matches = Vec::new();
        for file in state.files.values() {
            let candidate = file.path.trim_start_matches('/');
            if include.is_match(candidate) && !exclude.is_match(candidate) {
                matches.push(PathBuf::from(&file.path));
            }
        }
        Ok(matches)
    }
}

impl InMemoryHost {
    fn transfer(&self, src: &Path, dest: &Path, remove_source: bool) -> Result<()> {
        let src_display = Self::display(src);
        let dest_display = Self::display(dest);
        let src_key = self.key(&src_display);
        let mut state = self.state.write().unwrap();

        if let Some(file) = state.files.get(&src_key) {
            let text = file.text.clone();
            if remove_source {
                state.files.remove(&src_key);
            }
            if let Some(parent) = Self::parent_display(&dest_display) {
                self.create_dir_chain(&mut state, &parent);
            }
            state.files.insert(
                self.key(&dest_display),
                FileData {
                    path: dest_display,
                    text,
                },
            );
            return Ok(());
        }

        let Some(stored_src) = state.dirs.get(&src_key).cloned() else {
            return Err(StageError::PathNotFound(src_display));
        };

        if let Some(parent) = Self::parent_display(&dest_display) {
            self.create_dir_chain(&mut state, &parent);
        }

        let prefix = self.dir_prefix_key(&src_display);
        let moved_dirs: Vec<String> = state
            .dirs
            .values()
            .filter(|d| {
                *d == &stored_src || self.key(d).starts_with(&prefix)
            })
            .cloned()
            .collect();
        let moved_files: Vec<(String, String)> = state
            .files
            .values()
            .filter(|f| self.key(&f.path).starts_with(&prefix))
            .map(|f| (f.path.clone(), f.text.clone()))
            .collect();

        if remove_source {
            state.dirs.remove(&src_key);
            state.files.retain(|k, _| !k.starts_with(&prefix));
            state.dirs.retain(|k, _| !k.starts_with(&prefix));
        }

        for dir in moved_dirs {
            let relocated = format!("{dest_display}{}", &dir[stored_src.len()..]);
            state.dirs.insert(self.key(&relocated), relocated.clone());
        }
        for (path, text) in moved_files {
            let relocated = format!("{dest_display}{}", &path[stored_src.len()..]);
            state.files.insert(
                self.key(&relocated),
                FileData {
                    path: relocated,
                    text,
                },
            );
        }
        Ok(())
    }
}

/// Compiles `patterns` into include and exclude matchers; `!`-prefixed
/// patterns exclude.
pub(crate) fn build_matchers(patterns: &[String]) -> Result<(GlobSet, GlobSet)> {
    let mut include = GlobSetBuilder::new();
    let mut exclude = GlobSetBuilder::new();
    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            exclude.add(Glob::new(negated.trim_start_matches('/')).map_err(anyhow::Error::from)?);
        } else {
            include.add(Glob::new(pattern.trim_start_matches('/')).map_err(anyhow::Error::from)?);
        }
    }
    Ok((
        include.build().map_err(anyhow::Error::from)?,
        exclude.build().map_err(anyhow::Error::from)?,
    ))
}
