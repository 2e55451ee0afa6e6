//! Standardized path values and canonical-casing upkeep.
//!
//! Every path keyed into the staging tree is a [`StandardizedPath`]:
//! absolute, forward-slash-separated, no trailing slash (except the root),
//! and reconciled to a canonical casing on case-insensitive hosts.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Result, StageError};

/// An absolute, slash-normalized, case-reconciled path.
///
/// Opaque by design: callers obtain one from
/// [`TransactionalFileSystem::standardize_path`](crate::TransactionalFileSystem::standardize_path)
/// rather than constructing it directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StandardizedPath(String);

impl StandardizedPath {
    /// The filesystem root, `/`.
    pub fn root() -> Self {
        StandardizedPath("/".to_string())
    }

    /// Wraps a string already in standardized form.
    pub(crate) fn from_standardized(path: String) -> Self {
        StandardizedPath(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == root_len(&self.0)
    }

    /// The owning directory, or `None` for the root.
    pub fn parent(&self) -> Option<StandardizedPath> {
        if self.is_root() {
            return None;
        }
        let root = root_len(&self.0);
        match self.0.rfind('/') {
            Some(idx) if idx + 1 > root => Some(StandardizedPath(self.0[..idx].to_string())),
            _ => Some(StandardizedPath(self.0[..root].to_string())),
        }
    }

    /// The last path component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rfind('/').map(|idx| &self.0[idx + 1..])
    }

    /// Appends a single component.
    pub fn join(&self, name: &str) -> StandardizedPath {
        if self.is_root() {
            StandardizedPath(format!("{}{}", &self.0[..root_len(&self.0)], name))
        } else {
            StandardizedPath(format!("{}/{}", self.0, name))
        }
    }

    /// True if `self` lies inside `other`'s subtree, or is `other` itself.
    pub fn is_descendant_or_equal_of(&self, other: &StandardizedPath) -> bool {
        if self == other {
            return true;
        }
        if other.is_root() {
            return self.0.starts_with(&other.0);
        }
        self.0.len() > other.0.len()
            && self.0.starts_with(&other.0)
            && self.0.as_bytes()[other.0.len()] == b'/'
    }

    /// Walks the parent chain, nearest ancestor first, ending at the root.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            current: self.parent(),
        }
    }
}

/// Iterator over a path's ancestors, nearest first. See [`StandardizedPath::ancestors`].
pub struct Ancestors {
    current: Option<StandardizedPath>,
}

impl Iterator for Ancestors {
    type Item = StandardizedPath;

    fn next(&mut self) -> Option<StandardizedPath> {
        let next = self.current.take()?;
        self.current = next.parent();
        Some(next)
    }
}

impl fmt::Display for StandardizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for StandardizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl AsRef<str> for StandardizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StandardizedPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Length of the root prefix: 1 for `/...`, 3 for `C:/...`.
fn root_len(path: &str) -> usize {
    let bytes = path.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes[2] == b'/'
    {
        3
    } else {
        1
    }
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.first() == Some(&b'/')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Normalizes `raw` into standardized form, resolving relative input
/// against `base` (itself an absolute, slash-normalized path).
///
/// Collapses `.` and `..` components, converts backslashes, and strips any
/// trailing slash. Casing is not touched here; that is the
/// [`PathCasingMaintainer`]'s job.
pub(crate) fn standardize(raw: &str, base: &str) -> Result<StandardizedPath> {
    if raw.is_empty() {
        return Err(StageError::InvalidPath(
            raw.to_string(),
            "cannot be empty".to_string(),
        ));
    }

    let raw = raw.replace('\\', "/");
    let joined = if is_absolute(&raw) {
        raw
    } else {
        format!("{}/{}", base, raw)
    };

    let prefix = if root_len(&joined) == 3 {
        joined[..2].to_string()
    } else {
        String::new()
    };
    let after_root = &joined[prefix.len()..];

    let mut components: Vec<&str> = Vec::new();
    for component in after_root.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // "/.." stays at the root
                components.pop();
            }
            name => components.push(name),
        }
    }

    let mut standardized = prefix;
    standardized.push('/');
    standardized.push_str(&components.join("/"));
    Ok(StandardizedPath(standardized))
}

/// Remembers the first-seen casing of each path on case-insensitive hosts.
///
/// On case-sensitive hosts every method is the identity. On case-insensitive
/// hosts, [`get_path`](Self::get_path) returns the casing first seen for a
/// path regardless of the casing used in the call, and
/// [`remove_path`](Self::remove_path) lets the next touch establish a new
/// canonical casing. Remove is called whenever a path is deleted or moved
/// away from.
pub(crate) struct PathCasingMaintainer {
    // None on case-sensitive hosts
    mappings: Option<HashMap<String, StandardizedPath>>,
}

impl PathCasingMaintainer {
    pub fn new(case_sensitive: bool) -> Self {
        PathCasingMaintainer {
            mappings: if case_sensitive {
                None
            } else {
                Some(HashMap::new())
            },
        }
    }

    /// Returns the canonical casing for `path`, establishing it if unseen.
    pub fn get_path(&mut self, path: StandardizedPath) -> StandardizedPath {
        let Some(mappings) = self.mappings.as_mut() else {
            return path;
        };
        mappings
            .entry(path.as_str().to_lowercase())
            .or_insert(path)
            .clone()
    }

    /// Forgets the canonical casing for `path`.
    pub fn remove_path(&mut self, path: &StandardizedPath) {
        if let Some(mappings) = self.mappings.as_mut() {
            mappings.remove(&path.as_str().to_lowercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn std_path(raw: &str) -> StandardizedPath {
        standardize(raw, "/").unwrap()
    }

    #[test]
    fn standardize_absolute_passthrough() {
        assert_eq!(std_path("/dir/file.ts").as_str(), "/dir/file.ts");
    }

    #[test]
    fn standardize_resolves_relative_against_base() {
        assert_eq!(
            standardize("file.ts", "/some/dir").unwrap().as_str(),
            "/some/dir/file.ts"
        );
    }

    #[test]
    fn standardize_collapses_dots() {
        assert_eq!(std_path("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(std_path("/a/../../b").as_str(), "/b");
    }

    #[test]
    fn standardize_normalizes_slashes() {
        assert_eq!(std_path("/a\\b\\c/").as_str(), "/a/b/c");
        assert_eq!(std_path("/a//b///c").as_str(), "/a/b/c");
    }

    #[test]
    fn standardize_keeps_root() {
        assert_eq!(std_path("/").as_str(), "/");
        assert!(std_path("/").is_root());
    }

    #[test]
    fn standardize_drive_letter() {
        let p = std_path("C:\\dir\\file.ts");
        assert_eq!(p.as_str(), "C:/dir/file.ts");
        assert_eq!(p.parent().unwrap().as_str(), "C:/dir");
        assert_eq!(
            p.parent().unwrap().parent().unwrap().as_str(),
            "C:/"
        );
        assert!(std_path("C:/").is_root());
    }

    #[test]
    fn standardize_rejects_empty() {
        assert!(matches!(
            standardize("", "/"),
            Err(StageError::InvalidPath(..))
        ));
    }

    #[test]
    fn parent_walks_to_root() {
        let p = std_path("/a/b/c");
        assert_eq!(p.parent().unwrap().as_str(), "/a/b");
        assert_eq!(std_path("/a").parent().unwrap().as_str(), "/");
        assert_eq!(std_path("/").parent(), None);
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(std_path("/a/b/c.ts").file_name(), Some("c.ts"));
        assert_eq!(std_path("/").file_name(), None);
    }

    #[test]
    fn join_from_root_and_nested() {
        assert_eq!(std_path("/").join("a").as_str(), "/a");
        assert_eq!(std_path("/a").join("b").as_str(), "/a/b");
    }

    #[test]
    fn descendant_or_equal_needs_component_boundary() {
        let dir = std_path("/dir");
        assert!(std_path("/dir").is_descendant_or_equal_of(&dir));
        assert!(std_path("/dir/sub/file.ts").is_descendant_or_equal_of(&dir));
        assert!(!std_path("/dir2").is_descendant_or_equal_of(&dir));
        assert!(std_path("/dir").is_descendant_or_equal_of(&std_path("/")));
    }

    #[test]
    fn ancestors_nearest_first() {
        let collected: Vec<String> = std_path("/a/b/c")
            .ancestors()
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(collected, vec!["/a/b", "/a", "/"]);
    }

    #[test]
    fn casing_maintainer_identity_when_case_sensitive() {
        let mut maintainer = PathCasingMaintainer::new(true);
        assert_eq!(
            maintainer.get_path(std_path("/Test.ts")).as_str(),
            "/Test.ts"
        );
        assert_eq!(
            maintainer.get_path(std_path("/tesT.ts")).as_str(),
            "/tesT.ts"
        );
    }

    #[test]
    fn casing_maintainer_first_seen_wins() {
        let mut maintainer = PathCasingMaintainer::new(false);
        assert_eq!(
            maintainer.get_path(std_path("/Test.ts")).as_str(),
            "/Test.ts"
        );
        assert_eq!(
            maintainer.get_path(std_path("/tesT.ts")).as_str(),
            "/Test.ts"
        );
    }

    #[test]
    fn casing_maintainer_remove_resets_canonical() {
        let mut maintainer = PathCasingMaintainer::new(false);
        let canonical = maintainer.get_path(std_path("/Test.ts"));
        maintainer.remove_path(&canonical);
        assert_eq!(
            maintainer.get_path(std_path("/tesT.ts")).as_str(),
            "/tesT.ts"
        );
    }
}
